#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    if let Err(e) = carelink::run().await {
        eprintln!("carelink: {e}");
        std::process::exit(1);
    }
}
