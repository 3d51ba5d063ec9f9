use tracing::Level;

#[rocket::main]
async fn main() -> anyhow::Result<()> {
    #[cfg(debug_assertions)]
    let level = Some(Level::DEBUG);
    #[cfg(not(debug_assertions))]
    let level = Some(Level::INFO);

    let rocket = tutorhub_backend::create(level).await?;

    if let Err(e) = rocket.launch().await {
        tracing::error!("Error launching server: {}", e);
    }

    Ok(())
}
