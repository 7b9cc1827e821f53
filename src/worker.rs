/// worker support structs shared by the store worker and the rebuild pool
///
use serde::{Deserialize, Serialize};

pub type JsonString = String;

pub const OK: &str = "ok";
pub const DOWN: &str = "down";

#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum WorkerState {
    #[default]
    Idle,
    Busy,
    Shutdown,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkerStatus {
    pub worker_id: String,
    pub status: String,
    pub state: WorkerState,
    pub uptime: String,
    pub completed: u64,
    pub error_count: u64,
}

impl WorkerStatus {
    pub fn new(
        worker_id: String,
        state: WorkerState,
        uptime: String,
        completed: u64,
        error_count: u64,
    ) -> WorkerStatus {
        let status = if state == WorkerState::Shutdown {
            DOWN
        } else {
            OK
        };

        WorkerStatus {
            worker_id,
            status: status.to_string(),
            state,
            uptime,
            completed,
            error_count,
        }
    }

    pub fn to_json(&self) -> JsonString {
        match serde_json::to_string(self) {
            Ok(js) => js,
            Err(e) => format!(r#"{}"status":"json parse error: {:?}"{}"#, "{", e, "}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_follows_state() {
        let status = WorkerStatus::new("w1".to_string(), WorkerState::Busy, "0".to_string(), 3, 1);
        assert_eq!(status.status, OK);

        let status = WorkerStatus::new("w1".to_string(), WorkerState::Shutdown, "0".to_string(), 3, 1);
        assert_eq!(status.status, DOWN);
    }

    #[test]
    fn json_round_trip() {
        let status = WorkerStatus::new("w2".to_string(), WorkerState::Idle, "0 days".to_string(), 0, 0);
        let js = status.to_json();
        assert!(js.starts_with(r#"{"worker_id":"w2","status":"ok""#));

        let back: WorkerStatus = serde_json::from_str(&js).expect("should parse");
        assert_eq!(back, status);
    }

    #[test]
    fn bounded_responder() {
        async_std::task::block_on(async move {
            let (s, r) = async_channel::bounded(1);
            assert!(r.is_empty());
            assert_eq!(s.send(10).await, Ok(()));
            assert!(r.is_full());
            assert_eq!(r.recv().await, Ok(10));

            // closing the sender closes the receiver once drained
            assert!(s.close());
            assert!(r.is_closed());
            assert!(r.recv().await.is_err());
        });
    }
}
