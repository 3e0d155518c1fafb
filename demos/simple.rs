use std::env;

use anyhow::Result;
use obsession::{requests::general::GetVersion, Client};

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt::init();

    let client = Client::connect("localhost", 4455, env::var("OBS_PASSWORD").ok()).await?;

    let version = client.send(&GetVersion).await?;
    println!("{version:#?}");

    println!("current scene: {:?}", client.current_scene());

    Ok(())
}
