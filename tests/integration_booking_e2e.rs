//! End-to-end checks against a running server.
//!
//! Start the server with `DATABASE_URL` pointing at the same database as
//! `TEST_DATABASE_URL`, then run `cargo test -- --ignored`.

use once_cell::sync::Lazy;
use serde_json::{Value, json};
use tokio_postgres::NoTls;

static BASE_URL: Lazy<String> = Lazy::new(|| {
    std::env::var("SLOTBOOK_URL").unwrap_or_else(|_| "http://127.0.0.1:3000".to_string())
});

struct TestContext {
    client: reqwest::Client,
    db: tokio_postgres::Client,
}

impl TestContext {
    async fn new() -> Self {
        let url = std::env::var("TEST_DATABASE_URL").expect("TEST_DATABASE_URL must be set");
        let (db, connection) = tokio_postgres::connect(&url, NoTls).await.unwrap();
        tokio::spawn(connection);

        Self {
            client: reqwest::Client::new(),
            db,
        }
    }

    /// Inserts a session on a date no other test uses and returns its id.
    async fn seed_session(&self, activity: &str, capacity: i32) -> (i64, String) {
        let row = self
            .db
            .query_one(
                "INSERT INTO sessions (activity, event_date, start_time, end_time, capacity)
                 VALUES ($1, DATE '2099-01-01' + (random() * 3000)::int, '10:00', '10:30', $2)
                 RETURNING id, to_char(event_date, 'YYYY-MM-DD') AS day",
                &[&activity, &capacity],
            )
            .await
            .unwrap();
        (row.get("id"), row.get("day"))
    }

    async fn book(&self, session_id: i64, n: usize) -> reqwest::Response {
        self.client
            .post(format!("{}/api/bookings", *BASE_URL))
            .json(&json!({
                "session_id": session_id,
                "full_name": format!("E2E Attendee {n}"),
                "phone": "+34 600 000 000",
                "email": format!("e2e{n}@example.com"),
                "consent": true
            }))
            .send()
            .await
            .unwrap()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    #[ignore = "requires a running server and TEST_DATABASE_URL"]
    async fn test_concurrent_bookings_respect_capacity() {
        let context = TestContext::new().await;
        let (session_id, _) = context.seed_session("E2E Kayak", 2).await;

        let attempts = (0..5).map(|n| context.book(session_id, n));
        let responses = futures::future::join_all(attempts).await;

        let mut created = 0;
        let mut full = 0;
        for response in responses {
            match response.status().as_u16() {
                201 => {
                    let body: Value = response.json().await.unwrap();
                    assert_eq!(body["session_id"], session_id);
                    assert_eq!(body["message"], "Booking confirmed");
                    created += 1;
                }
                409 => full += 1,
                other => panic!("unexpected status {other}"),
            }
        }
        assert_eq!(created, 2);
        assert_eq!(full, 3);

        let remaining: Value = context
            .client
            .get(format!("{}/api/sessions/{}/remaining", *BASE_URL, session_id))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(remaining["remaining"], 0);
    }

    #[tokio::test]
    #[ignore = "requires a running server and TEST_DATABASE_URL"]
    async fn test_invalid_and_unknown_bookings() {
        let context = TestContext::new().await;

        let response = context.book(i64::MAX, 0).await;
        assert_eq!(response.status().as_u16(), 404);

        let response = context
            .client
            .post(format!("{}/api/bookings", *BASE_URL))
            .json(&json!({
                "session_id": 1,
                "full_name": "",
                "phone": "123",
                "email": "nope",
                "consent": false
            }))
            .send()
            .await
            .unwrap();
        assert_eq!(response.status().as_u16(), 400);
    }

    #[tokio::test]
    #[ignore = "requires a running server, TEST_DATABASE_URL and ADMIN_PASSWORD"]
    async fn test_admin_export() {
        let context = TestContext::new().await;
        let password = std::env::var("ADMIN_PASSWORD").expect("ADMIN_PASSWORD must be set");
        let (session_id, day) = context.seed_session("E2E Archery", 3).await;
        assert_eq!(context.book(session_id, 7).await.status().as_u16(), 201);

        let response = context
            .client
            .get(format!("{}/api/admin/bookings/export?date={}", *BASE_URL, day))
            .send()
            .await
            .unwrap();
        assert_eq!(response.status().as_u16(), 401);

        let response = context
            .client
            .get(format!("{}/api/admin/bookings/export?date={}", *BASE_URL, day))
            .header("x-admin-password", password)
            .send()
            .await
            .unwrap();
        assert_eq!(response.status().as_u16(), 200);
        let csv = response.text().await.unwrap();
        assert!(csv.starts_with("event_date,activity,start_time,end_time"));
        assert!(csv.contains("E2E Attendee 7"));
    }
}
