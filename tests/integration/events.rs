use std::time::Duration;

use anyhow::Result;
use futures_util::{pin_mut, StreamExt};
use obsession::events::{
    CurrentProgramSceneChanged, EventStreamError, StudioModeStateChanged,
};
use serde_json::json;
use tokio::time;

use crate::common;

#[test_log::test(tokio::test)]
async fn subscribers_only_see_their_type() -> Result<()> {
    let (client, server) = common::new_client().await?;

    let scenes = client.events::<CurrentProgramSceneChanged>()?;
    let studio = client.events::<StudioModeStateChanged>()?;
    pin_mut!(scenes);
    pin_mut!(studio);

    server.send_event(
        "CurrentProgramSceneChanged",
        4,
        json!({"sceneName": "Scene 2"}),
    );

    let event = scenes.next().await.expect("stream ended")?;
    assert_eq!(event.scene_name, "Scene 2");

    assert!(time::timeout(Duration::from_millis(100), studio.next())
        .await
        .is_err());

    server.stop().await
}

#[test_log::test(tokio::test)]
async fn merged_streams_cover_a_set_of_types() -> Result<()> {
    let (client, server) = common::new_client().await?;

    let stream =
        client.events_by_name(["CurrentProgramSceneChanged", "StudioModeStateChanged"])?;
    pin_mut!(stream);

    server.send_event(
        "CurrentProgramSceneChanged",
        4,
        json!({"sceneName": "Scene 2"}),
    );
    server.send_event("InputMuted", 8, json!({"inputName": "Mic", "inputMuted": true}));
    server.send_event("StudioModeStateChanged", 1024, json!({"studioModeEnabled": true}));

    let first = stream.next().await.expect("stream ended")?;
    assert_eq!(first.event_type, "CurrentProgramSceneChanged");

    let second = stream.next().await.expect("stream ended")?;
    assert_eq!(second.event_type, "StudioModeStateChanged");

    server.stop().await
}

#[test_log::test(tokio::test)]
async fn waiting_for_one_event_completes_on_first_match() -> Result<()> {
    let (client, server) = common::new_client().await?;

    let (event, ()) = tokio::join!(client.wait_for::<StudioModeStateChanged>(), async {
        // Make sure the waiter subscribed before anything is published.
        time::sleep(Duration::from_millis(50)).await;
        server.send_event("StudioModeStateChanged", 1024, json!({"studioModeEnabled": true}));
    });

    assert!(event?.studio_mode_enabled);

    server.stop().await
}

#[test_log::test(tokio::test)]
async fn undecodable_payloads_surface_as_stream_errors() -> Result<()> {
    let (client, server) = common::new_client().await?;

    let stream = client.events::<CurrentProgramSceneChanged>()?;
    pin_mut!(stream);

    server.send_event("CurrentProgramSceneChanged", 4, json!({"sceneName": 5}));
    server.send_event(
        "CurrentProgramSceneChanged",
        4,
        json!({"sceneName": "Scene 3"}),
    );

    let error = stream.next().await.expect("stream ended").unwrap_err();
    assert!(matches!(error, EventStreamError::Decode(_)));

    // The stream survives the bad payload.
    let event = stream.next().await.expect("stream ended")?;
    assert_eq!(event.scene_name, "Scene 3");

    server.stop().await
}
