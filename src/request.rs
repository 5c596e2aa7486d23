use std::path::PathBuf;

use reqwest::multipart::{Form, Part};

use tokio::fs;

use tracing::info;

use crate::{entry::RequestEntry, error::Error, locator::locate_show};

/// Everything needed for one submission attempt. Built fresh per attempt.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UploadPayload {
    pub name: String,
    pub description: String,
    pub publish_date: String,
    pub audio: PathBuf,
    pub image: PathBuf,
}

pub fn show_title(artist: &str, airdate: &str) -> String {
    format!("{artist} for SNS - {airdate}")
}

pub fn show_description(artist: &str) -> String {
    format!("{artist} for SNS.")
}

/// Builds the payload for `entry`, or `None` if its show folder doesn't hold
/// exactly one track and one picture.
pub async fn build_request(entry: &RequestEntry) -> Option<UploadPayload> {
    let name = show_title(&entry.artist, &entry.airdate);
    info!("Preparing {name} in {}", entry.artist);
    let files = locate_show(&entry.folder()).await?;
    Some(UploadPayload {
        name,
        description: show_description(&entry.artist),
        publish_date: entry.publish_timestamp(),
        audio: files.audio,
        image: files.image,
    })
}

impl UploadPayload {
    /// Reads both files and renders the multipart form the upload endpoint expects.
    pub async fn into_form(self) -> Result<Form, Error> {
        let mp3 = Part::bytes(fs::read(&self.audio).await?)
            .file_name("track.mp3")
            .mime_str("audio/mpeg")?;
        let picture = Part::bytes(fs::read(&self.image).await?)
            .file_name("picture.jpg")
            .mime_str("image/jpeg")?;
        Ok(Form::new()
            .part("mp3", mp3)
            .part("picture", picture)
            .text("name", self.name)
            .text("description", self.description)
            .text("publish_date", self.publish_date))
    }
}

#[cfg(test)]
mod tests {
    use std::fs;

    use crate::entry::{parse_date, parse_time, Schedule};

    use super::*;

    fn schedule() -> Schedule {
        Schedule {
            airdate: "5th August 2021".to_owned(),
            publish_date: parse_date("2021-08-23").unwrap(),
            publish_time: parse_time("00:00:00").unwrap(),
        }
    }

    #[test]
    fn title_and_description() {
        assert_eq!(
            show_title("DJ Elephant", "5th August 2021"),
            "DJ Elephant for SNS - 5th August 2021"
        );
        assert_eq!(show_description("DJ Elephant"), "DJ Elephant for SNS.");
    }

    #[tokio::test]
    async fn builds_payload_from_show_folder() {
        let root = tempfile::tempdir().unwrap();
        let folder = root.path().join("DJ Elephant");
        fs::create_dir(&folder).unwrap();
        fs::write(folder.join("mix.mp3"), b"audio").unwrap();
        fs::write(folder.join("art.jpg"), b"image").unwrap();

        let entry = RequestEntry::new("DJ Elephant", root.path(), &schedule());
        let payload = build_request(&entry).await.unwrap();
        assert_eq!(payload.name, "DJ Elephant for SNS - 5th August 2021");
        assert_eq!(payload.description, "DJ Elephant for SNS.");
        assert_eq!(payload.publish_date, "2021-08-23T00:00:00Z");
        assert_eq!(payload.audio, folder.join("mix.mp3"));
        assert_eq!(payload.image, folder.join("art.jpg"));

        assert!(payload.into_form().await.is_ok());
    }

    #[tokio::test]
    async fn ambiguous_folder_builds_nothing() {
        let root = tempfile::tempdir().unwrap();
        let folder = root.path().join("The Band");
        fs::create_dir(&folder).unwrap();
        fs::write(folder.join("mix.mp3"), b"audio").unwrap();
        fs::write(folder.join("a.jpg"), b"image").unwrap();
        fs::write(folder.join("b.jpg"), b"image").unwrap();

        let entry = RequestEntry::new("The Band", root.path(), &schedule());
        assert_eq!(build_request(&entry).await, None);
    }

    #[tokio::test]
    async fn vanished_file_fails_form() {
        let payload = UploadPayload {
            name: "x".to_owned(),
            description: "x".to_owned(),
            publish_date: "2021-08-23T00:00:00Z".to_owned(),
            audio: PathBuf::from("/nonexistent/track.mp3"),
            image: PathBuf::from("/nonexistent/picture.jpg"),
        };
        assert!(matches!(payload.into_form().await, Err(Error::Io(_))));
    }
}
