//! Clients talking to a real relay bound on a loopback port.

use sealpost_api::AppStateInner;
use sealpost_client::{Client, ClientError, Peers};
use sealpost_crypto::KeyPair;
use sealpost_mailbox::Mailbox;

async fn spawn_relay() -> String {
    let app = sealpost_api::router(AppStateInner::new(Mailbox::in_memory()));
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{}", addr)
}

fn user(url: &str, name: &str) -> Client {
    let keys = KeyPair::generate_with_bits(1024).unwrap();
    Client::new(url, name, keys, Peers::new()).unwrap()
}

#[tokio::test]
async fn alice_receives_message_from_bob() {
    let url = spawn_relay().await;
    let mut alice = user(&url, "alice");
    let mut bob = user(&url, "bob");

    assert!(alice.health().await);
    assert!(alice.register().await.unwrap());
    assert!(bob.register().await.unwrap());

    bob.send("alice", "Hello world!").await.unwrap();
    assert!(bob.peers().contains("alice"));

    // Alice has never heard of bob; pulling fetches his key
    assert!(!alice.peers().contains("bob"));
    let messages = alice.pull().await.unwrap();
    assert_eq!(messages.len(), 1);
    assert_eq!(messages[0].sender, "bob");
    assert_eq!(messages[0].recipient, "alice");
    assert_eq!(messages[0].body, "Hello world!");
    assert!(alice.peers().contains("bob"));

    assert!(alice.pull().await.unwrap().is_empty());
    assert_eq!(alice.deferred(), 0);

    // Both sides keep a transcript
    let received = alice.conversations().with("bob");
    assert_eq!(received.len(), 1);
    assert!(!received[0].sent);
    assert_eq!(received[0].body, "Hello world!");
    assert_eq!(received[0].time, messages[0].timestamp);

    let sent = bob.conversations().with("alice");
    assert_eq!(sent.len(), 1);
    assert!(sent[0].sent);
    assert_eq!(sent[0].body, "Hello world!");
}

#[tokio::test]
async fn transcript_interleaves_both_directions() {
    let url = spawn_relay().await;
    let mut alice = user(&url, "alice");
    let mut bob = user(&url, "bob");
    alice.register().await.unwrap();
    bob.register().await.unwrap();

    alice.send("bob", "ping").await.unwrap();
    bob.pull().await.unwrap();
    bob.send("alice", "pong").await.unwrap();
    alice.pull().await.unwrap();

    let thread: Vec<(bool, &str)> = alice
        .conversations()
        .with("bob")
        .iter()
        .map(|e| (e.sent, e.body.as_str()))
        .collect();
    assert_eq!(thread, vec![(true, "ping"), (false, "pong")]);
    assert_eq!(bob.conversations().peers(), vec!["alice"]);
}

#[tokio::test]
async fn names_that_break_url_paths_are_refused() {
    let url = spawn_relay().await;
    let mut slashed = user(&url, "a/b");
    assert!(matches!(
        slashed.register().await,
        Err(ClientError::UnexpectedStatus(status)) if status == reqwest::StatusCode::BAD_REQUEST
    ));

    // The encoded lookup reaches the server, which knows no such user
    let mut bob = user(&url, "bob");
    bob.register().await.unwrap();
    assert!(bob.lookup("a/b").await.unwrap().is_none());
    assert!(matches!(
        bob.send("a/b", "hello").await,
        Err(ClientError::UnknownRecipient(name)) if name == "a/b"
    ));
    assert!(bob.conversations().is_empty());
}

#[tokio::test]
async fn messages_arrive_in_order() {
    let url = spawn_relay().await;
    let mut alice = user(&url, "alice");
    let mut bob = user(&url, "bob");
    alice.register().await.unwrap();
    bob.register().await.unwrap();

    let long = "x".repeat(1000);
    for body in ["first", "", long.as_str(), "last"] {
        bob.send("alice", body).await.unwrap();
    }

    let bodies: Vec<String> = alice
        .pull()
        .await
        .unwrap()
        .into_iter()
        .map(|m| m.body)
        .collect();
    assert_eq!(bodies, vec!["first".to_string(), String::new(), long, "last".to_string()]);
}

#[tokio::test]
async fn username_is_first_come_first_served() {
    let url = spawn_relay().await;
    let mut alice = user(&url, "alice");
    let mut impostor = user(&url, "alice");

    assert!(alice.register().await.unwrap());
    assert!(!impostor.register().await.unwrap());

    // The impostor's proofs do not verify against alice's key
    assert!(matches!(impostor.pull().await, Err(ClientError::Unauthorized)));
    assert!(matches!(
        impostor.send("alice", "hi").await,
        Err(ClientError::Unauthorized)
    ));
}

#[tokio::test]
async fn send_to_unregistered_user_fails_locally() {
    let url = spawn_relay().await;
    let mut bob = user(&url, "bob");
    bob.register().await.unwrap();

    assert!(bob.lookup("nobody").await.unwrap().is_none());
    assert!(matches!(
        bob.send("nobody", "hello?").await,
        Err(ClientError::UnknownRecipient(name)) if name == "nobody"
    ));
}

#[tokio::test]
async fn unregistered_client_cannot_pull() {
    let url = spawn_relay().await;
    let mut ghost = user(&url, "ghost");
    assert!(matches!(ghost.pull().await, Err(ClientError::Unauthorized)));
}
