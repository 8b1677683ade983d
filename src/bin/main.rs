//! Binary entrypoint for the studymate tool

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    studymate::cli::run().await
}
