use collab_edit::server::Server;
use dotenv::dotenv;
use std::env;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();
    env_logger::init();

    let addr = env::var("SERVER_ADDR").unwrap_or("127.0.0.1:9999".to_string());
    let files_dir = env::var("FILES_DIR").unwrap_or("./files".to_string());

    let server = Server::bind(&addr, files_dir).await?;
    tokio::spawn(async move {
        if let Err(e) = server.run().await {
            log::error!("server error: {}", e);
        }
    });

    tokio::signal::ctrl_c().await?;
    log::info!("shutting down server");

    Ok(())
}
