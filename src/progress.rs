use crate::CrawlerError;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::info;

/// Checkpoint of a paged crawl: the next page to fetch and every record captured so far.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResumeState<T> {
    pub current_page: u32,
    pub data: Vec<T>,
}

impl<T> Default for ResumeState<T> {
    fn default() -> Self {
        ResumeState {
            current_page: 1,
            data: Vec::new(),
        }
    }
}

pub struct ProgressStore {
    path: PathBuf,
}

impl ProgressStore {
    pub fn new<P: AsRef<Path>>(path: P) -> ProgressStore {
        ProgressStore {
            path: path.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub async fn load<T: DeserializeOwned>(&self) -> Result<ResumeState<T>, CrawlerError> {
        match fs::read(&self.path).await {
            Ok(bytes) => {
                let state: ResumeState<T> = serde_json::from_slice(&bytes)?;
                info!(
                    "Resuming at page {} with {} records from {}",
                    state.current_page,
                    state.data.len(),
                    self.path.display()
                );
                Ok(state)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                info!("No progress file at {}, starting fresh", self.path.display());
                Ok(ResumeState::default())
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Replaces the checkpoint by writing a sibling file and renaming it over the target.
    pub async fn save<T: Serialize>(&self, state: &ResumeState<T>) -> Result<(), CrawlerError> {
        let json = serde_json::to_vec(state)?;
        let mut tmp = self.path.clone().into_os_string();
        tmp.push(".tmp");
        let tmp = PathBuf::from(tmp);

        fs::write(&tmp, json).await?;
        fs::rename(&tmp, &self.path).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scratch(name: &str) -> PathBuf {
        std::env::temp_dir().join(format!("apec-progress-{}-{}.json", name, std::process::id()))
    }

    #[tokio::test]
    async fn missing_file_starts_at_page_one() {
        let path = scratch("missing");
        let _ = fs::remove_file(&path).await;

        let state: ResumeState<String> = ProgressStore::new(&path).load().await.unwrap();
        assert_eq!(state, ResumeState::default());
        assert_eq!(state.current_page, 1);
        assert!(state.data.is_empty());
    }

    #[tokio::test]
    async fn save_overwrites_previous_checkpoint() {
        let path = scratch("overwrite");
        let store = ProgressStore::new(&path);

        store
            .save(&ResumeState {
                current_page: 2,
                data: vec!["a".to_string()],
            })
            .await
            .unwrap();
        store
            .save(&ResumeState {
                current_page: 3,
                data: vec!["a".to_string(), "b".to_string()],
            })
            .await
            .unwrap();

        let state: ResumeState<String> = store.load().await.unwrap();
        assert_eq!(state.current_page, 3);
        assert_eq!(state.data, vec!["a".to_string(), "b".to_string()]);

        let raw = fs::read_to_string(&path).await.unwrap();
        assert!(raw.contains(r#""current_page":3"#));

        fs::remove_file(&path).await.unwrap();
    }

    #[tokio::test]
    async fn corrupt_file_is_an_error() {
        let path = scratch("corrupt");
        fs::write(&path, "{not json").await.unwrap();

        let result: Result<ResumeState<String>, _> = ProgressStore::new(&path).load().await;
        assert!(matches!(result, Err(CrawlerError::JsonError(_))));

        fs::remove_file(&path).await.unwrap();
    }
}
