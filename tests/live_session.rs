#[allow(dead_code)]
mod common;

use common::{
    TestServer, option_id, ws_connect, ws_expect, ws_read_until, ws_send, ws_sync,
    ws_try_read_json,
};
use serde_json::{Value, json};

#[tokio::test]
async fn healthcheck_reports_ok() {
    let server = TestServer::new().await;
    let body: Value = server
        .http
        .get(server.url("/healthcheck"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(body["status"], "ok");
}

#[tokio::test]
async fn host_paced_game_end_to_end() {
    let server = TestServer::new().await;
    let session = server.open_session("HOST_PACED", 2).await;
    let code = session["joinCode"].as_str().unwrap();
    assert_eq!(code.len(), 6);

    let ada = server.join_ok(code, "ada").await;
    let bob = server.join_ok(code, "bob").await;
    let carol = server.join_ok(code, "carol").await;

    let mut host = server.connect_host(&session).await;
    let mut ada_ws = server.connect_participant(code, &ada).await;
    let mut bob_ws = server.connect_participant(code, &bob).await;
    let mut carol_ws = server.connect_participant(code, &carol).await;
    ws_read_until(&mut host, "PLAYER_JOINED").await;
    let second = ws_read_until(&mut host, "PLAYER_JOINED").await;
    assert_eq!(second["name"], "bob");

    ws_send(&mut host, json!({"type": "START_GAME"})).await;
    for stream in [&mut host, &mut ada_ws, &mut bob_ws, &mut carol_ws] {
        let start = ws_read_until(stream, "START").await;
        assert_eq!(start["mode"], "HOST_PACED");
    }

    ws_send(&mut host, json!({"type": "NEXT_QUESTION"})).await;
    let q0 = ws_expect(&mut host, "NEXT_QUESTION").await;
    assert_eq!(q0["question"]["index"], 0);
    assert_eq!(q0["question"]["total"], 2);
    assert_eq!(q0["question"]["timeLimit"], 20);
    assert!(q0["question"]["options"][0].get("isCorrect").is_none());
    for stream in [&mut ada_ws, &mut bob_ws, &mut carol_ws] {
        let frame = ws_expect(stream, "NEXT_QUESTION").await;
        assert_eq!(frame["question"], q0["question"]);
    }

    ws_send(
        &mut ada_ws,
        json!({"type": "ANSWER", "participantId": ada, "optionId": option_id(&q0, 0), "timeTaken": 1200}),
    )
    .await;
    let seen = ws_expect(&mut ada_ws, "PARTICIPANT_ANSWER").await;
    assert_eq!(seen["isCorrect"], true);
    let received = ws_expect(&mut ada_ws, "ANSWER_RECEIVED").await;
    assert_eq!(received["points"], 100);
    assert_eq!(received["score"], 100);

    ws_send(
        &mut bob_ws,
        json!({"type": "ANSWER", "participantId": bob, "optionId": option_id(&q0, 1), "timeTaken": 900}),
    )
    .await;
    let received = ws_read_until(&mut bob_ws, "ANSWER_RECEIVED").await;
    assert_eq!(received["points"], 0);
    assert_eq!(received["score"], 0);

    let next: Value = server
        .host_command(&session, "next")
        .await
        .json()
        .await
        .unwrap();
    assert_eq!(next["finished"], false);
    assert_eq!(next["question"]["index"], 1);

    let q1 = ws_read_until(&mut ada_ws, "NEXT_QUESTION").await;
    ws_send(
        &mut ada_ws,
        json!({"type": "ANSWER", "participantId": ada, "optionId": option_id(&q1, 0), "timeTaken": 500}),
    )
    .await;
    let received = ws_read_until(&mut ada_ws, "ANSWER_RECEIVED").await;
    assert_eq!(received["score"], 200);

    let done: Value = server
        .host_command(&session, "next")
        .await
        .json()
        .await
        .unwrap();
    assert_eq!(done["finished"], true);
    assert_eq!(done["leaderboard"][0]["name"], "ada");
    assert_eq!(done["leaderboard"][0]["score"], 200);
    assert_eq!(done["leaderboard"][1]["name"], "bob");
    assert_eq!(done["leaderboard"][1]["score"], 0);
    assert_eq!(done["leaderboard"][2]["name"], "carol");
    assert_eq!(done["leaderboard"].as_array().unwrap().len(), 3);

    for stream in [&mut host, &mut ada_ws, &mut bob_ws, &mut carol_ws] {
        let over = ws_read_until(stream, "GAME_OVER").await;
        assert_eq!(over["leaderboard"], done["leaderboard"]);
    }
}

#[tokio::test]
async fn self_paced_participants_progress_independently() {
    let server = TestServer::new().await;
    let session = server.open_session("SELF_PACED", 2).await;
    let code = session["joinCode"].as_str().unwrap();
    let ada = server.join_ok(code, "ada").await;

    let mut host = server.connect_host(&session).await;
    let response = server.host_command(&session, "start").await;
    assert_eq!(response.status(), 200);

    // late socket: the current question arrives right after the join
    let mut ada_ws = server.connect_participant(code, &ada).await;
    let q0 = ws_expect(&mut ada_ws, "NEXT_QUESTION").await;
    assert_eq!(q0["question"]["index"], 0);

    ws_send(
        &mut ada_ws,
        json!({"type": "ANSWER", "participantId": ada, "optionId": option_id(&q0, 0), "timeTaken": 300}),
    )
    .await;
    ws_expect(&mut ada_ws, "PARTICIPANT_ANSWER").await;
    ws_expect(&mut ada_ws, "ANSWER_RECEIVED").await;
    let q1 = ws_expect(&mut ada_ws, "NEXT_QUESTION").await;
    assert_eq!(q1["question"]["index"], 1);
    let progress = ws_expect(&mut ada_ws, "PARTICIPANT_PROGRESS").await;
    assert_eq!(progress["questionIndex"], 1);

    ws_send(
        &mut ada_ws,
        json!({"type": "ANSWER", "participantId": ada, "optionId": option_id(&q1, 2), "timeTaken": 300}),
    )
    .await;
    ws_expect(&mut ada_ws, "PARTICIPANT_ANSWER").await;
    ws_expect(&mut ada_ws, "ANSWER_RECEIVED").await;
    let over = ws_expect(&mut ada_ws, "GAME_OVER_SELF").await;
    assert_eq!(over["score"], 100);

    let finished = ws_read_until(&mut host, "PARTICIPANT_FINISHED").await;
    assert_eq!(finished["participantId"], ada.as_str());

    let view = server.host_view(&session).await;
    assert_eq!(view["session"]["status"], "ACTIVE");
    assert_eq!(view["participants"][0]["finished"], true);
    assert_eq!(view["participants"][0]["questionCursor"], 2);

    // a reconnect after finishing lands on the final score again
    drop(ada_ws);
    let mut again = server.connect_participant(code, &ada).await;
    let over = ws_expect(&mut again, "GAME_OVER_SELF").await;
    assert_eq!(over["score"], 100);
}

#[tokio::test]
async fn join_after_start_is_rejected_without_a_row() {
    let server = TestServer::new().await;
    let session = server.open_session("HOST_PACED", 1).await;
    let code = session["joinCode"].as_str().unwrap();
    server.join_ok(code, "ada").await;
    assert_eq!(server.host_command(&session, "start").await.status(), 200);

    let response = server.join(code, "late").await;
    assert_eq!(response.status(), 409);

    let view = server.host_view(&session).await;
    assert_eq!(view["participants"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn join_validates_input() {
    let server = TestServer::new().await;
    let session = server.open_session("HOST_PACED", 1).await;
    let code = session["joinCode"].as_str().unwrap();

    assert_eq!(server.join(code, "   ").await.status(), 400);
    assert_eq!(server.join(code, "a name far too long").await.status(), 400);
    assert_eq!(server.join("abc", "ada").await.status(), 400);

    let unknown = if code == "999999" { "888888" } else { "999999" };
    assert_eq!(server.join(unknown, "ada").await.status(), 404);
}

#[tokio::test]
async fn duplicate_answer_gets_an_error_and_no_points() {
    let server = TestServer::new().await;
    let session = server.open_session("HOST_PACED", 1).await;
    let code = session["joinCode"].as_str().unwrap();
    let ada = server.join_ok(code, "ada").await;
    let mut ada_ws = server.connect_participant(code, &ada).await;

    server.host_command(&session, "start").await;
    server.host_command(&session, "next").await;
    let q0 = ws_read_until(&mut ada_ws, "NEXT_QUESTION").await;

    let answer = json!({"type": "ANSWER", "participantId": ada, "optionId": option_id(&q0, 0), "timeTaken": 10});
    ws_send(&mut ada_ws, answer.clone()).await;
    ws_read_until(&mut ada_ws, "ANSWER_RECEIVED").await;

    ws_send(&mut ada_ws, answer).await;
    let error = ws_expect(&mut ada_ws, "ERROR").await;
    assert_eq!(error["message"], "answer already submitted");

    let view = server.host_view(&session).await;
    assert_eq!(view["participants"][0]["score"], 100);
}

#[tokio::test]
async fn answers_for_another_identity_are_dropped() {
    let server = TestServer::new().await;
    let session = server.open_session("HOST_PACED", 1).await;
    let code = session["joinCode"].as_str().unwrap();
    let ada = server.join_ok(code, "ada").await;
    let bob = server.join_ok(code, "bob").await;
    let mut ada_ws = server.connect_participant(code, &ada).await;

    server.host_command(&session, "start").await;
    server.host_command(&session, "next").await;
    let q0 = ws_read_until(&mut ada_ws, "NEXT_QUESTION").await;

    ws_send(
        &mut ada_ws,
        json!({"type": "ANSWER", "participantId": bob, "optionId": option_id(&q0, 0)}),
    )
    .await;
    assert!(ws_try_read_json(&mut ada_ws, 200).await.is_none());

    let view = server.host_view(&session).await;
    assert_eq!(view["participants"][1]["score"], 0);
}

#[tokio::test]
async fn participants_cannot_drive_the_game() {
    let server = TestServer::new().await;
    let session = server.open_session("HOST_PACED", 1).await;
    let code = session["joinCode"].as_str().unwrap();
    let ada = server.join_ok(code, "ada").await;
    let mut ada_ws = server.connect_participant(code, &ada).await;

    ws_send(&mut ada_ws, json!({"type": "START_GAME"})).await;
    let error = ws_expect(&mut ada_ws, "ERROR").await;
    assert_eq!(error["message"], "only the host can control the game");

    let view = server.host_view(&session).await;
    assert_eq!(view["session"]["status"], "WAITING");
}

#[tokio::test]
async fn host_credentials_are_enforced() {
    let server = TestServer::new().await;
    let session = server.open_session("HOST_PACED", 1).await;
    let code = session["joinCode"].as_str().unwrap();
    let session_id = session["sessionId"].as_str().unwrap();

    let missing = server
        .http
        .post(server.url(&format!("/sessions/{session_id}/start")))
        .send()
        .await
        .unwrap();
    assert_eq!(missing.status(), 401);

    let wrong = server
        .http
        .post(server.url(&format!("/sessions/{session_id}/start")))
        .header("X-Host-Token", "not-the-token")
        .send()
        .await
        .unwrap();
    assert_eq!(wrong.status(), 403);

    let quiz = server.create_quiz("HOST_PACED", 1).await;
    let stranger = server
        .http
        .post(server.url(&format!("/quizzes/{}/sessions", quiz["id"].as_str().unwrap())))
        .header("X-Host-Id", "someone-else")
        .send()
        .await
        .unwrap();
    assert_eq!(stranger.status(), 403);

    for (query, expected) in [
        (format!("code={code}&role=HOST"), 401),
        (format!("code={code}&role=HOST&token=nope"), 403),
    ] {
        match tokio_tungstenite::connect_async(server.ws_url(&query)).await {
            Err(tokio_tungstenite::tungstenite::Error::Http(response)) => {
                assert_eq!(response.status().as_u16(), expected);
            }
            other => panic!("expected an HTTP rejection, got {:?}", other.map(|_| ())),
        }
    }
}

#[tokio::test]
async fn attach_identity_must_belong_to_the_room() {
    let server = TestServer::new().await;
    let session = server.open_session("HOST_PACED", 1).await;
    let code = session["joinCode"].as_str().unwrap();
    let ada = server.join_ok(code, "ada").await;
    let other = server.open_session("HOST_PACED", 1).await;
    let eve = server
        .join_ok(other["joinCode"].as_str().unwrap(), "eve")
        .await;

    let unknown = "00000000-0000-4000-8000-000000000000".to_owned();
    for participant_id in [eve, unknown] {
        let query = format!("code={code}&participantId={participant_id}");
        match tokio_tungstenite::connect_async(server.ws_url(&query)).await {
            Err(tokio_tungstenite::tungstenite::Error::Http(response)) => {
                assert_eq!(response.status().as_u16(), 403);
            }
            other => panic!("expected an HTTP rejection, got {:?}", other.map(|_| ())),
        }
    }

    let mut ada_ws = ws_connect(&server.ws_url(&format!("code={code}&participantId={ada}"))).await;
    ws_send(&mut ada_ws, json!({"type": "JOIN", "participantId": ada})).await;
    let joined = ws_read_until(&mut ada_ws, "PLAYER_JOINED").await;
    assert_eq!(joined["participantId"], ada.as_str());
}

#[tokio::test]
async fn ending_twice_repeats_the_same_leaderboard() {
    let server = TestServer::new().await;
    let session = server.open_session("HOST_PACED", 1).await;
    let code = session["joinCode"].as_str().unwrap();
    server.join_ok(code, "ada").await;
    let mut host = server.connect_host(&session).await;

    server.host_command(&session, "start").await;
    let first: Value = server.host_command(&session, "end").await.json().await.unwrap();
    let second: Value = server.host_command(&session, "end").await.json().await.unwrap();
    assert_eq!(first, second);

    ws_read_until(&mut host, "GAME_OVER").await;
    ws_expect(&mut host, "GAME_OVER").await;

    let resume: Value = server
        .http
        .get(server.url(&format!(
            "/participants/{}/resume",
            first["leaderboard"][0]["id"].as_str().unwrap()
        )))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(resume["state"], "FINISHED");
}

#[tokio::test]
async fn socket_without_room_code_is_closed() {
    let server = TestServer::new().await;
    let mut stream = ws_connect(&server.ws_url("code=")).await;
    use futures::StreamExt;
    let frame = tokio::time::timeout(std::time::Duration::from_secs(5), stream.next())
        .await
        .unwrap();
    assert!(matches!(
        frame,
        Some(Ok(tokio_tungstenite::tungstenite::Message::Close(_))) | None | Some(Err(_))
    ));
}

#[tokio::test]
async fn unknown_messages_are_ignored() {
    let server = TestServer::new().await;
    let session = server.open_session("HOST_PACED", 1).await;
    let mut host = server.connect_host(&session).await;

    ws_send(&mut host, json!({"type": "DANCE"})).await;
    ws_sync(&mut host).await;
    assert!(ws_try_read_json(&mut host, 200).await.is_none());
}
