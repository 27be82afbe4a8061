// tests/interview_tests.rs

use backend::{config::Config, routes, state::AppState};
use sqlx::sqlite::SqlitePoolOptions;

/// Helper function to spawn the app on a random port for testing.
/// Each test gets its own in-memory SQLite database.
async fn spawn_app() -> String {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await
        .expect("Failed to open in-memory SQLite for testing");

    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .expect("Failed to migrate database");

    let config = Config {
        database_url: "sqlite::memory:".to_string(),
        jwt_secret: "test_secret_for_integration_tests".to_string(),
        jwt_expiration: 600,
        rust_log: "error".to_string(),
        admin_username: None,
        admin_password: None,
        starting_credits: 2,
    };

    let state = AppState { pool, config };
    let app = routes::create_router(state);

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind random port");
    let port = listener.local_addr().unwrap().port();
    let address = format!("http://127.0.0.1:{}", port);

    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    address
}

/// Registers a fresh user and returns their bearer token.
async fn register_and_login(address: &str, client: &reqwest::Client) -> String {
    let username = format!("u_{}", &uuid::Uuid::new_v4().to_string()[..8]);

    client
        .post(&format!("{}/api/auth/register", address))
        .json(&serde_json::json!({
            "username": username,
            "password": "password123"
        }))
        .send()
        .await
        .expect("Register failed");

    let login_resp = client
        .post(&format!("{}/api/auth/login", address))
        .json(&serde_json::json!({
            "username": username,
            "password": "password123"
        }))
        .send()
        .await
        .expect("Login failed")
        .json::<serde_json::Value>()
        .await
        .expect("Failed to parse login json");

    login_resp["token"]
        .as_str()
        .expect("Token not found")
        .to_string()
}

async fn create_interview(address: &str, client: &reqwest::Client, token: &str) -> i64 {
    let resp = client
        .post(&format!("{}/api/interviews", address))
        .header("Authorization", format!("Bearer {}", token))
        .json(&serde_json::json!({}))
        .send()
        .await
        .expect("Create interview failed");
    assert_eq!(resp.status().as_u16(), 201);

    let body = resp
        .json::<serde_json::Value>()
        .await
        .expect("Failed to parse interview json");
    body["interview_id"].as_i64().expect("interview_id missing")
}

/// Conversation record in mid-interview shape: question 2's payload carries
/// question 1's feedback and announces question 2's text.
fn mid_interview_record() -> serde_json::Value {
    serde_json::json!({
        "id": "conv-1",
        "current_topic": 1,
        "current_subtopic": "basics",
        "current_question_number": 2,
        "topics": {
            "1": {
                "name": "Intro",
                "questions": {
                    "1": {
                        "messages": [
                            { "author": "interviewer", "content": "Tell me about yourself." },
                            { "author": "user", "content": "I am an engineer." }
                        ]
                    },
                    "2": {
                        "messages": [
                            {
                                "author": "interviewer",
                                "content": "{\"score\":8,\"feedback\":\"Good clarity.\",\"next_question\":\"Explain REST.\"}"
                            }
                        ]
                    }
                }
            }
        }
    })
}

/// Completed interview: sentinel set, final question carries its own
/// trailing feedback payload.
fn finished_record() -> serde_json::Value {
    serde_json::json!({
        "id": "conv-1",
        "current_topic": 0,
        "current_subtopic": "finished",
        "current_question_number": 0,
        "topics": {
            "1": {
                "name": "Intro",
                "questions": {
                    "1": {
                        "messages": [
                            { "author": "interviewer", "content": "Tell me about yourself." },
                            { "author": "user", "content": "I am an engineer." },
                            {
                                "author": "interviewer",
                                "content": "{\"score\":9,\"feedback\":\"Solid answer.\",\"next_question\":\"\",\"next_topic\":\"\",\"next_subtopic\":\"\"}"
                            }
                        ]
                    }
                }
            }
        }
    })
}

#[tokio::test]
async fn create_interview_uses_default_opening_question() {
    let address = spawn_app().await;
    let client = reqwest::Client::new();
    let token = register_and_login(&address, &client).await;

    let resp = client
        .post(&format!("{}/api/interviews", address))
        .header("Authorization", format!("Bearer {}", token))
        .json(&serde_json::json!({}))
        .send()
        .await
        .expect("Create interview failed");

    assert_eq!(resp.status().as_u16(), 201);
    let body = resp.json::<serde_json::Value>().await.unwrap();
    assert_eq!(body["status"], "active");
    assert!(
        body["first_question"]
            .as_str()
            .is_some_and(|q| !q.is_empty())
    );
}

#[tokio::test]
async fn create_interview_runs_out_of_credits() {
    let address = spawn_app().await;
    let client = reqwest::Client::new();
    let token = register_and_login(&address, &client).await;

    // starting_credits is 2 in the test config
    create_interview(&address, &client, &token).await;
    create_interview(&address, &client, &token).await;

    let resp = client
        .post(&format!("{}/api/interviews", address))
        .header("Authorization", format!("Bearer {}", token))
        .json(&serde_json::json!({}))
        .send()
        .await
        .expect("Failed to execute request");

    assert_eq!(resp.status().as_u16(), 402);
    let body = resp.json::<serde_json::Value>().await.unwrap();
    assert_eq!(body["error"], "You do not have enough credits.");
}

#[tokio::test]
async fn transcript_resolves_lookahead_feedback() {
    let address = spawn_app().await;
    let client = reqwest::Client::new();
    let token = register_and_login(&address, &client).await;
    let interview_id = create_interview(&address, &client, &token).await;

    let resp = client
        .post(&format!("{}/api/conversations/{}", address, interview_id))
        .header("Authorization", format!("Bearer {}", token))
        .json(&mid_interview_record())
        .send()
        .await
        .expect("Upsert conversation failed");
    assert_eq!(resp.status().as_u16(), 200);

    let body = client
        .get(&format!(
            "{}/api/conversations/{}/transcript",
            address, interview_id
        ))
        .header("Authorization", format!("Bearer {}", token))
        .send()
        .await
        .expect("Fetch transcript failed")
        .json::<serde_json::Value>()
        .await
        .expect("Failed to parse transcript json");

    assert_eq!(body["status"], "active");

    let transcript = body["transcript"].as_array().expect("transcript missing");
    assert_eq!(transcript.len(), 3);

    assert_eq!(transcript[0]["role"], "interviewer");
    assert_eq!(transcript[0]["content"], "Tell me about yourself.");

    assert_eq!(transcript[1]["role"], "user");
    assert_eq!(transcript[1]["content"], "I am an engineer.");
    assert_eq!(transcript[1]["score"], 8);
    assert_eq!(transcript[1]["feedback"], "Good clarity.");

    assert_eq!(transcript[2]["role"], "interviewer");
    assert_eq!(transcript[2]["content"], "Explain REST.");
    // Unresolved fields are omitted, not null
    assert!(transcript[2].get("score").is_none());
}

#[tokio::test]
async fn finished_record_completes_interview_and_appends_summary() {
    let address = spawn_app().await;
    let client = reqwest::Client::new();
    let token = register_and_login(&address, &client).await;
    let interview_id = create_interview(&address, &client, &token).await;

    client
        .post(&format!("{}/api/conversations/{}", address, interview_id))
        .header("Authorization", format!("Bearer {}", token))
        .json(&finished_record())
        .send()
        .await
        .expect("Upsert conversation failed");

    let interview = client
        .get(&format!("{}/api/interviews/{}", address, interview_id))
        .header("Authorization", format!("Bearer {}", token))
        .send()
        .await
        .expect("Fetch interview failed")
        .json::<serde_json::Value>()
        .await
        .unwrap();
    assert_eq!(interview["interview"]["status"], "completed");

    let body = client
        .get(&format!(
            "{}/api/conversations/{}/transcript",
            address, interview_id
        ))
        .header("Authorization", format!("Bearer {}", token))
        .send()
        .await
        .expect("Fetch transcript failed")
        .json::<serde_json::Value>()
        .await
        .unwrap();

    let transcript = body["transcript"].as_array().expect("transcript missing");

    let user_entry = &transcript[1];
    assert_eq!(user_entry["score"], 9);
    assert_eq!(user_entry["feedback"], "Solid answer.");

    let summary = transcript.last().unwrap();
    assert_eq!(summary["role"], "system");
    let content = summary["content"].as_str().unwrap();
    assert!(content.contains("INTERVIEW COMPLETED"));
    assert!(content.contains("Your final score: 9/10 (90%)"));
}

#[tokio::test]
async fn rejected_create_leaves_no_partial_state() {
    let address = spawn_app().await;
    let client = reqwest::Client::new();
    let token = register_and_login(&address, &client).await;

    create_interview(&address, &client, &token).await;
    create_interview(&address, &client, &token).await;

    let resp = client
        .post(&format!("{}/api/interviews", address))
        .header("Authorization", format!("Bearer {}", token))
        .json(&serde_json::json!({}))
        .send()
        .await
        .expect("Failed to execute request");
    assert_eq!(resp.status().as_u16(), 402);

    // The failed attempt must not have spent a credit or left a stray row:
    // decrement and insert commit together or not at all.
    let me = client
        .get(&format!("{}/api/profile/me", address))
        .header("Authorization", format!("Bearer {}", token))
        .send()
        .await
        .expect("Fetch profile failed")
        .json::<serde_json::Value>()
        .await
        .unwrap();
    assert_eq!(me["credits"], 0);
    assert_eq!(me["interviews_count"], 2);

    let interviews = client
        .get(&format!("{}/api/interviews", address))
        .header("Authorization", format!("Bearer {}", token))
        .send()
        .await
        .expect("List interviews failed")
        .json::<serde_json::Value>()
        .await
        .unwrap();
    assert_eq!(interviews.as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn rejected_upsert_keeps_previous_record_and_status() {
    let address = spawn_app().await;
    let client = reqwest::Client::new();
    let token = register_and_login(&address, &client).await;
    let interview_id = create_interview(&address, &client, &token).await;

    let resp = client
        .post(&format!("{}/api/conversations/{}", address, interview_id))
        .header("Authorization", format!("Bearer {}", token))
        .json(&mid_interview_record())
        .send()
        .await
        .expect("Upsert conversation failed");
    assert_eq!(resp.status().as_u16(), 200);

    // A malformed replacement is rejected before anything is written
    let resp = client
        .post(&format!("{}/api/conversations/{}", address, interview_id))
        .header("Authorization", format!("Bearer {}", token))
        .json(&serde_json::json!({ "topics": [1, 2, 3] }))
        .send()
        .await
        .expect("Failed to execute request");
    assert_eq!(resp.status().as_u16(), 400);

    let body = client
        .get(&format!(
            "{}/api/conversations/{}/transcript",
            address, interview_id
        ))
        .header("Authorization", format!("Bearer {}", token))
        .send()
        .await
        .expect("Fetch transcript failed")
        .json::<serde_json::Value>()
        .await
        .unwrap();

    assert_eq!(body["status"], "active");
    assert_eq!(body["transcript"].as_array().unwrap().len(), 3);
    assert_eq!(body["transcript"][0]["content"], "Tell me about yourself.");
}

#[tokio::test]
async fn upsert_rejects_malformed_record() {
    let address = spawn_app().await;
    let client = reqwest::Client::new();
    let token = register_and_login(&address, &client).await;
    let interview_id = create_interview(&address, &client, &token).await;

    // topics must be an object, not an array
    let resp = client
        .post(&format!("{}/api/conversations/{}", address, interview_id))
        .header("Authorization", format!("Bearer {}", token))
        .json(&serde_json::json!({ "topics": [1, 2, 3] }))
        .send()
        .await
        .expect("Failed to execute request");

    assert_eq!(resp.status().as_u16(), 400);
}

#[tokio::test]
async fn transcript_404_before_any_record_exists() {
    let address = spawn_app().await;
    let client = reqwest::Client::new();
    let token = register_and_login(&address, &client).await;
    let interview_id = create_interview(&address, &client, &token).await;

    let resp = client
        .get(&format!(
            "{}/api/conversations/{}/transcript",
            address, interview_id
        ))
        .header("Authorization", format!("Bearer {}", token))
        .send()
        .await
        .expect("Failed to execute request");

    assert_eq!(resp.status().as_u16(), 404);
}

#[tokio::test]
async fn users_cannot_read_each_others_interviews() {
    let address = spawn_app().await;
    let client = reqwest::Client::new();

    let owner_token = register_and_login(&address, &client).await;
    let interview_id = create_interview(&address, &client, &owner_token).await;

    client
        .post(&format!("{}/api/conversations/{}", address, interview_id))
        .header("Authorization", format!("Bearer {}", owner_token))
        .json(&mid_interview_record())
        .send()
        .await
        .expect("Upsert conversation failed");

    let other_token = register_and_login(&address, &client).await;

    for path in [
        format!("/api/interviews/{}", interview_id),
        format!("/api/conversations/{}", interview_id),
        format!("/api/conversations/{}/transcript", interview_id),
    ] {
        let resp = client
            .get(&format!("{}{}", address, path))
            .header("Authorization", format!("Bearer {}", other_token))
            .send()
            .await
            .expect("Failed to execute request");
        assert_eq!(resp.status().as_u16(), 404, "leaked through {}", path);
    }
}
