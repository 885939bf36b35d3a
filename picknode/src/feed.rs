use std::net::{TcpListener, TcpStream};
use std::sync::{Arc, Mutex};
use std::thread;

use arbiter::{Candidate, PredictionSink};
use messages::{send_message, PredictionList, PredictionMsg};

/// Live predictions feed. Subscribers connect to the feed port and receive
/// the full candidate set after every store mutation; dead subscribers are
/// dropped on the next publish.
pub struct PredictionFeed {
    subscribers: Arc<Mutex<Vec<TcpStream>>>,
}

impl PredictionFeed {
    pub fn listen(addr: &str) -> anyhow::Result<PredictionFeed> {
        let listener = TcpListener::bind(addr)?;
        let subscribers: Arc<Mutex<Vec<TcpStream>>> = Arc::new(Mutex::new(Vec::new()));

        {
            let subscribers = subscribers.clone();
            thread::spawn(move || {
                for stream in listener.incoming() {
                    match stream {
                        Ok(stream) => {
                            log::info!("New predictions feed subscriber");
                            subscribers.lock().unwrap().push(stream);
                        }
                        Err(e) => log::error!("Failed to accept feed subscriber: {e}"),
                    }
                }
            });
        }

        Ok(PredictionFeed { subscribers })
    }

    pub fn handle(&self) -> FeedHandle {
        FeedHandle {
            subscribers: self.subscribers.clone(),
        }
    }
}

/// Cheap clone of the feed usable as a `PredictionSink` from any thread.
#[derive(Clone)]
pub struct FeedHandle {
    subscribers: Arc<Mutex<Vec<TcpStream>>>,
}

impl PredictionSink for FeedHandle {
    fn publish(&mut self, predictions: &[Candidate]) {
        let list = PredictionList {
            predictions: predictions
                .iter()
                .map(|c| PredictionMsg {
                    x: c.position.x,
                    y: c.position.y,
                    proba: c.probability,
                })
                .collect(),
        };

        let mut subscribers = self.subscribers.lock().unwrap();
        subscribers.retain_mut(|stream| send_message(stream, &list).is_ok());
    }
}
