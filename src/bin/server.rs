use tracing::Level;

#[rocket::main]
async fn main() -> anyhow::Result<()> {
    #[cfg(debug_assertions)]
    let level = Some(Level::DEBUG);
    #[cfg(not(debug_assertions))]
    let level = Some(Level::INFO);

    let r = sporty_smash_backend::create(level).await?;
    if let Err(e) = r.launch().await {
        tracing::error!("Error launching server: {}", e);
        return Err(anyhow::anyhow!("server stopped: {}", e));
    }

    Ok(())
}
