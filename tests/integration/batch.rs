use anyhow::Result;
use obsession::{
    requests::scenes::{GetCurrentProgramScene, SetCurrentPreviewScene, SetCurrentProgramScene},
    responses::StatusCode,
    Error,
};
use serde_json::{json, Value};

use crate::common::{self, BatchScript};

#[test_log::test(tokio::test)]
async fn results_map_back_to_their_requests() -> Result<()> {
    let (client, server) = common::new_client().await?;

    server.expect_batch(vec![
        BatchScript::ok(Value::Null),
        BatchScript::ok(json!({"currentProgramSceneName": "Scene 2"})),
    ]);

    let mut batch = client.batch();
    batch
        .push(
            Some("switch"),
            &SetCurrentProgramScene {
                scene_name: "Scene 2",
            },
        )?
        .push(Some("confirm"), &GetCurrentProgramScene)?;
    let responses = batch.send().await?;

    assert_eq!(responses.len(), 2);
    assert!(responses.response::<SetCurrentProgramScene<'_>>("switch").is_some());
    assert_eq!(
        responses
            .response::<GetCurrentProgramScene>("confirm")
            .map(|rsp| rsp.current_program_scene_name.as_str()),
        Some("Scene 2"),
    );

    server.stop().await
}

#[test_log::test(tokio::test)]
async fn halted_batches_report_the_executed_prefix() -> Result<()> {
    let (client, server) = common::new_client().await?;

    server.expect_batch(vec![
        BatchScript::ok(json!({"currentProgramSceneName": "Scene 1"})),
        BatchScript::err(506, "studio mode is not active"),
        BatchScript::ok(json!({"currentProgramSceneName": "Scene 1"})),
    ]);

    let mut batch = client.batch();
    batch
        .push(Some("a"), &GetCurrentProgramScene)?
        .push(
            Some("b"),
            &SetCurrentPreviewScene {
                scene_name: "Scene 2",
            },
        )?
        .push(Some("c"), &GetCurrentProgramScene)?;
    let responses = batch.halt_on_failure(true).send().await?;

    assert_eq!(responses.len(), 2);
    assert!(responses.response::<GetCurrentProgramScene>("a").is_some());
    assert_eq!(
        responses.failure("b").map(|status| status.code),
        Some(StatusCode::StudioModeNotActive),
    );
    assert!(responses.outcome("c").is_none());

    server.stop().await
}

#[test_log::test(tokio::test)]
async fn requests_without_id_key_by_discriminator() -> Result<()> {
    let (client, server) = common::new_client().await?;

    server.expect_batch(vec![BatchScript::ok(
        json!({"currentProgramSceneName": "Scene 1"}),
    )]);

    let mut batch = client.batch();
    batch.push(None, &GetCurrentProgramScene)?;
    let responses = batch.send().await?;

    assert_eq!(
        responses
            .response::<GetCurrentProgramScene>("GetCurrentProgramScene")
            .map(|rsp| rsp.current_program_scene_name.as_str()),
        Some("Scene 1"),
    );

    server.stop().await
}

#[test_log::test(tokio::test)]
async fn homogeneous_batches_yield_typed_results() -> Result<()> {
    let (client, server) = common::new_client().await?;

    server.expect_batch(vec![
        BatchScript::ok(Value::Null),
        BatchScript::err(600, "no such scene"),
    ]);

    let results = client
        .send_batch([
            (
                "one".to_owned(),
                SetCurrentProgramScene {
                    scene_name: "Scene 1",
                },
            ),
            (
                "two".to_owned(),
                SetCurrentProgramScene {
                    scene_name: "Gone",
                },
            ),
        ])
        .await?;

    assert_eq!(results.len(), 2);
    assert!(matches!(results["one"], Ok(())));
    assert!(matches!(
        results["two"],
        Err(Error::RequestFailed {
            code: StatusCode::ResourceNotFound,
            ..
        }),
    ));

    server.stop().await
}
