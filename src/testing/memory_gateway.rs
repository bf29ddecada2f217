use crate::domain::error::PersistError;
use crate::domain::video::{Rendition, Video};
use crate::ports::persistence::PersistenceGateway;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

#[derive(Default)]
struct State {
    videos: HashMap<String, Video>,
    renditions: Vec<Rendition>,
    fail_writes: bool,
}

/// Clones share the same store.
#[derive(Clone, Default)]
pub struct MemoryGateway {
    state: Arc<Mutex<State>>,
}

impl MemoryGateway {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_video(&self, video: Video) {
        let mut state = self.state.lock().unwrap();
        state.videos.insert(video.id.clone(), video);
    }

    pub fn video(&self, id: &str) -> Option<Video> {
        self.state.lock().unwrap().videos.get(id).cloned()
    }

    /// Rendition rows created for `video_id`, in creation order.
    pub fn renditions(&self, video_id: &str) -> Vec<Rendition> {
        self.state
            .lock()
            .unwrap()
            .renditions
            .iter()
            .filter(|r| r.video_id == video_id)
            .cloned()
            .collect()
    }

    /// Every later write fails with a store error.
    pub fn fail_writes(&self) {
        self.state.lock().unwrap().fail_writes = true;
    }
}

#[async_trait]
impl PersistenceGateway for MemoryGateway {
    async fn get_video(&self, id: &str) -> Result<Video, PersistError> {
        self.video(id)
            .ok_or_else(|| PersistError::VideoNotFound(id.to_string()))
    }

    async fn create_rendition(&self, rendition: Rendition) -> Result<Rendition, PersistError> {
        let mut state = self.state.lock().unwrap();
        if state.fail_writes {
            return Err(PersistError::Store("write refused".to_string()));
        }
        state.renditions.push(rendition.clone());
        Ok(rendition)
    }

    async fn update_video(&self, video: Video) -> Result<Video, PersistError> {
        let mut state = self.state.lock().unwrap();
        if state.fail_writes {
            return Err(PersistError::Store("write refused".to_string()));
        }
        if !state.videos.contains_key(&video.id) {
            return Err(PersistError::VideoNotFound(video.id));
        }
        state.videos.insert(video.id.clone(), video.clone());
        Ok(video)
    }
}
