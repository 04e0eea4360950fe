use chrono::{DateTime, Duration, Utc};
use reqwest::{StatusCode, Url};
use tracing::{debug, info, warn};

use sealpost_crypto::{
    AuthProof, CipherEnvelope, KeyPair, PlainEnvelope, PublicKey, Rejection, open, prove, seal,
};
use sealpost_types::api::{
    AuthRequest, PullResponse, RegisterRequest, SendMessageRequest, UserResponse,
};
use sealpost_types::time;

use crate::conversations::Conversations;
use crate::error::ClientError;
use crate::peers::Peers;

/// One user's connection to a relay server.
pub struct Client {
    http: reqwest::Client,
    base_url: Url,
    username: String,
    keys: KeyPair,
    peers: Peers,
    conversations: Conversations,
    /// Newest timestamp we have put our name to; proofs must move past it.
    last_signed: Option<DateTime<Utc>>,
    /// Envelopes from senders we could not look up yet.
    deferred: Vec<CipherEnvelope>,
}

impl Client {
    pub fn new(
        server_url: impl Into<String>,
        username: impl Into<String>,
        keys: KeyPair,
        peers: Peers,
    ) -> Result<Self, ClientError> {
        let server_url = server_url.into();
        let base_url = Url::parse(&server_url)
            .ok()
            .filter(|url| !url.cannot_be_a_base())
            .ok_or(ClientError::InvalidServerUrl(server_url))?;
        Ok(Self {
            http: reqwest::Client::new(),
            base_url,
            username: username.into(),
            keys,
            peers,
            conversations: Conversations::new(),
            last_signed: None,
            deferred: Vec::new(),
        })
    }

    /// Continue previously saved transcripts instead of starting empty.
    pub fn with_conversations(mut self, conversations: Conversations) -> Self {
        self.conversations = conversations;
        self
    }

    pub fn username(&self) -> &str {
        &self.username
    }

    pub fn peers(&self) -> &Peers {
        &self.peers
    }

    pub fn conversations(&self) -> &Conversations {
        &self.conversations
    }

    /// Envelopes held back because their sender's key could not be fetched.
    /// They are retried at the start of the next `pull`.
    pub fn deferred(&self) -> usize {
        self.deferred.len()
    }

    /// True if the server answered its health check.
    pub async fn health(&self) -> bool {
        match self.http.get(self.endpoint(&["v1", "health"])).send().await {
            Ok(resp) => resp.status() == StatusCode::OK,
            Err(e) => {
                debug!("Health check failed: {}", e);
                false
            }
        }
    }

    /// Register our public key. `false` if the username is already taken.
    pub async fn register(&mut self) -> Result<bool, ClientError> {
        let at = self.next_timestamp();
        let req = RegisterRequest {
            username: self.username.clone(),
            public_key: self.keys.public().to_pem()?,
            time: at,
        };

        let resp = self
            .http
            .put(self.endpoint(&["v1", "user", "register"]))
            .json(&req)
            .send()
            .await?;

        match resp.status() {
            StatusCode::NO_CONTENT => {
                info!("Registered {} on {}", self.username, self.base_url);
                Ok(true)
            }
            StatusCode::CONFLICT => Ok(false),
            status => Err(ClientError::UnexpectedStatus(status)),
        }
    }

    /// Fetch a user's public key from the server.
    pub async fn lookup(&self, username: &str) -> Result<Option<PublicKey>, ClientError> {
        let resp = self
            .http
            .get(self.endpoint(&["v1", "user", username]))
            .send()
            .await?;

        match resp.status() {
            StatusCode::OK => {
                let user: UserResponse = resp.json().await?;
                Ok(Some(PublicKey::from_pem(&user.public_key)?))
            }
            StatusCode::NOT_FOUND => Ok(None),
            status => Err(ClientError::UnexpectedStatus(status)),
        }
    }

    /// Look up `username` and remember their key. `false` if no such user.
    pub async fn add_peer(&mut self, username: &str) -> Result<bool, ClientError> {
        match self.lookup(username).await? {
            Some(key) => {
                debug!("Added peer {}", username);
                self.peers.insert(username, key);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Seal `body` for `recipient` and hand it to the server.
    pub async fn send(&mut self, recipient: &str, body: &str) -> Result<(), ClientError> {
        if !self.peers.contains(recipient) && !self.add_peer(recipient).await? {
            return Err(ClientError::UnknownRecipient(recipient.to_string()));
        }
        let at = self.next_timestamp();
        let Some(recipient_key) = self.peers.get(recipient) else {
            return Err(ClientError::UnknownRecipient(recipient.to_string()));
        };

        let message = seal(&self.keys, recipient_key, &self.username, recipient, at, body)?;
        let proof = prove(&self.keys, &self.username, at)?;

        let req = SendMessageRequest {
            auth: auth_request(&proof),
            recipient: recipient.to_string(),
            message: message.into_string(),
        };

        let resp = self
            .http
            .put(self.endpoint(&["v1", "user", self.username.as_str(), "message", "send"]))
            .json(&req)
            .send()
            .await?;

        match resp.status() {
            StatusCode::NO_CONTENT => {
                self.conversations.record_sent(recipient, at, body);
                Ok(())
            }
            StatusCode::UNAUTHORIZED => Err(ClientError::Unauthorized),
            status => Err(ClientError::UnexpectedStatus(status)),
        }
    }

    /// Drain our mailbox and return every envelope that opened cleanly.
    /// Delivered messages are also appended to the transcripts.
    ///
    /// Rejected envelopes are logged and dropped. Envelopes from a sender we
    /// have no key for trigger one directory lookup before being judged.
    pub async fn pull(&mut self) -> Result<Vec<PlainEnvelope>, ClientError> {
        let at = self.next_timestamp();
        let proof = prove(&self.keys, &self.username, at)?;

        let resp = self
            .http
            .post(self.endpoint(&["v1", "user", self.username.as_str(), "message", "pull"]))
            .json(&auth_request(&proof))
            .send()
            .await?;

        let pulled: PullResponse = match resp.status() {
            StatusCode::OK => resp.json().await?,
            StatusCode::UNAUTHORIZED => return Err(ClientError::Unauthorized),
            status => return Err(ClientError::UnexpectedStatus(status)),
        };

        let mut pending = std::mem::take(&mut self.deferred);
        for text in pulled.messages {
            match CipherEnvelope::from_wire(text) {
                Some(cipher) => pending.push(cipher),
                None => warn!("Malformed envelope from server, ignoring"),
            }
        }

        let mut delivered = Vec::with_capacity(pending.len());
        for cipher in pending {
            if let Some(message) = self.open_envelope(cipher).await {
                self.conversations
                    .record_received(&message.sender, message.timestamp, message.body.clone());
                delivered.push(message);
            }
        }
        Ok(delivered)
    }

    async fn open_envelope(&mut self, cipher: CipherEnvelope) -> Option<PlainEnvelope> {
        let sender = match open(&self.keys, &self.peers, &cipher) {
            Ok(message) => return self.accept(message),
            Err(Rejection::UnknownSender { sender }) => sender,
            Err(rejection) => {
                warn!("Illegal message found, ignoring: {}", rejection);
                return None;
            }
        };

        match self.add_peer(&sender).await {
            Ok(true) => {}
            Ok(false) => {
                warn!("Message from unregistered user {:?}, ignoring", sender);
                return None;
            }
            Err(e) => {
                warn!("Could not look up sender {:?}, deferring: {}", sender, e);
                self.deferred.push(cipher);
                return None;
            }
        }

        match open(&self.keys, &self.peers, &cipher) {
            Ok(message) => self.accept(message),
            Err(rejection) => {
                warn!("Illegal message found, ignoring: {}", rejection);
                None
            }
        }
    }

    fn accept(&self, message: PlainEnvelope) -> Option<PlainEnvelope> {
        // A valid envelope meant for someone else was forwarded to us
        if message.recipient != self.username {
            warn!(
                "Message from {} addressed to {}, ignoring",
                message.sender, message.recipient
            );
            return None;
        }
        Some(message)
    }

    /// A timestamp strictly after every one this client has signed before.
    fn next_timestamp(&mut self) -> DateTime<Utc> {
        let mut at = time::now();
        if let Some(last) = self.last_signed {
            if at <= last {
                at = last + Duration::microseconds(1);
            }
        }
        self.last_signed = Some(at);
        at
    }

    /// `segments` appended to the server URL, each percent-encoded.
    fn endpoint(&self, segments: &[&str]) -> Url {
        let mut url = self.base_url.clone();
        // Cannot fail: `new` rejects cannot-be-a-base URLs
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }
}

fn auth_request(proof: &AuthProof) -> AuthRequest {
    AuthRequest {
        username: proof.username.clone(),
        time: proof.timestamp,
        signature: proof.signature_b64(),
    }
}
