#[tokio::main]
async fn main() {
    if let Err(e) = pulse_lib::run().await {
        eprintln!("pulse: {}", e);
        std::process::exit(1);
    }
}
