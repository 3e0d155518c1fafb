use anyhow::Result;
use futures_util::{pin_mut, StreamExt};
use obsession::{
    events::{CurrentPreviewSceneChanged, CurrentProgramSceneChanged, StudioModeStateChanged},
    Client,
};
use serde_json::json;

use crate::common::{MockServer, Session, PASSWORD, PREVIEW_SCENE, PROGRAM_SCENE};

#[test_log::test(tokio::test)]
async fn studio_mode_primes_the_preview_scene() -> Result<()> {
    let (server, port) = MockServer::start(Session::builder().studio_mode(true).build()).await?;
    let client = Client::connect("localhost", port, Some(PASSWORD)).await?;

    assert!(client.studio_mode_enabled());
    assert_eq!(client.current_program_scene().as_deref(), Some(PROGRAM_SCENE));
    assert_eq!(client.current_preview_scene().as_deref(), Some(PREVIEW_SCENE));
    assert_eq!(client.current_scene().as_deref(), Some(PREVIEW_SCENE));

    server.stop().await
}

#[test_log::test(tokio::test)]
async fn scene_events_update_the_tracked_names() -> Result<()> {
    let (server, port) = MockServer::start(Session::builder().studio_mode(true).build()).await?;
    let client = Client::connect("localhost", port, Some(PASSWORD)).await?;

    let programs = client.events::<CurrentProgramSceneChanged>()?;
    let previews = client.events::<CurrentPreviewSceneChanged>()?;
    pin_mut!(programs);
    pin_mut!(previews);

    server.send_event("CurrentProgramSceneChanged", 4, json!({"sceneName": "Live"}));
    programs.next().await.expect("stream ended")?;
    assert_eq!(client.current_program_scene().as_deref(), Some("Live"));

    server.send_event("CurrentPreviewSceneChanged", 4, json!({"sceneName": "Up next"}));
    previews.next().await.expect("stream ended")?;
    assert_eq!(client.current_preview_scene().as_deref(), Some("Up next"));
    assert_eq!(client.current_scene().as_deref(), Some("Up next"));

    server.stop().await
}

#[test_log::test(tokio::test)]
async fn leaving_studio_mode_clears_the_preview() -> Result<()> {
    let (server, port) = MockServer::start(Session::builder().studio_mode(true).build()).await?;
    let client = Client::connect("localhost", port, Some(PASSWORD)).await?;

    assert_eq!(client.current_scene().as_deref(), Some(PREVIEW_SCENE));

    let studio = client.events::<StudioModeStateChanged>()?;
    pin_mut!(studio);

    server.send_event("StudioModeStateChanged", 1024, json!({"studioModeEnabled": false}));
    studio.next().await.expect("stream ended")?;

    assert!(!client.studio_mode_enabled());
    assert_eq!(client.current_preview_scene(), None);
    assert_eq!(client.current_scene().as_deref(), Some(PROGRAM_SCENE));

    server.stop().await
}
