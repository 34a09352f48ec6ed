use crate::common::{TEST_MAX_FILE_SIZE_MB, TestApp, routes};

const MP3: &str = "audio/mpeg";

fn audio_bytes(seed: u8, len: usize) -> Vec<u8> {
    (0..len).map(|i| seed.wrapping_add(i as u8)).collect()
}

mod upload {
    use super::*;

    #[tokio::test]
    async fn first_upload_is_stored_under_the_owner_prefix() {
        let app = TestApp::spawn().await;
        let token = app.create_authenticated_user("alice", "securepass").await;

        let res = app
            .upload_audio("song.mp3", audio_bytes(1, 4096), MP3, &token)
            .await;

        assert_eq!(res.status, 201, "Upload failed: {}", res.text);
        assert_eq!(res.body["duplicate"], false);
        assert_eq!(res.body["file"]["original_name"], "song.mp3");
        assert_eq!(res.body["file"]["stored_name"], "song.mp3");
        assert_eq!(res.body["file"]["storage_key"], "StaticAudio/alice/song.mp3");
        assert_eq!(res.body["file"]["byte_size"], 4096);
        assert_eq!(res.body["file"]["media_type"], "audio/mpeg");
        assert_eq!(res.body["file"]["content_hash"].as_str().unwrap().len(), 64);
        assert!(app.object_exists("StaticAudio/alice/song.mp3").await);
    }

    #[tokio::test]
    async fn identical_bytes_return_the_existing_record() {
        let app = TestApp::spawn().await;
        let token = app.create_authenticated_user("alice", "securepass").await;
        let bytes = audio_bytes(7, 2048);

        let first = app.upload_audio("song.mp3", bytes.clone(), MP3, &token).await;
        assert_eq!(first.status, 201, "Upload failed: {}", first.text);

        // Different name, same content.
        let second = app.upload_audio("copy.mp3", bytes, MP3, &token).await;

        assert_eq!(second.status, 200);
        assert_eq!(second.body["duplicate"], true);
        assert_eq!(second.file_id(), first.file_id());
        assert!(!app.object_exists("StaticAudio/alice/copy.mp3").await);

        let list = app.get_with_token(routes::AUDIO, &token).await;
        assert_eq!(list.body["data"].as_array().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn name_collision_with_different_bytes_gets_a_suffix() {
        let app = TestApp::spawn().await;
        let token = app.create_authenticated_user("alice", "securepass").await;

        let first = app
            .upload_audio("song.mp3", audio_bytes(1, 1024), MP3, &token)
            .await;
        assert_eq!(first.status, 201, "Upload failed: {}", first.text);

        let second = app
            .upload_audio("song.mp3", audio_bytes(2, 1024), MP3, &token)
            .await;

        assert_eq!(second.status, 201, "Upload failed: {}", second.text);
        assert_eq!(second.body["file"]["original_name"], "song.mp3");
        let stored = second.body["file"]["stored_name"].as_str().unwrap();
        let suffix = stored
            .strip_prefix("song_")
            .and_then(|s| s.strip_suffix(".mp3"))
            .expect("stored name should be song_<suffix>.mp3");
        assert_eq!(suffix.len(), 8);
        assert!(suffix.chars().all(|c| c.is_ascii_hexdigit()));
        assert_eq!(
            second.body["file"]["storage_key"],
            format!("StaticAudio/alice/{stored}")
        );

        // The first object is untouched.
        assert!(app.object_exists("StaticAudio/alice/song.mp3").await);
        assert!(app.object_exists(&format!("StaticAudio/alice/{stored}")).await);
    }

    #[tokio::test]
    async fn same_bytes_from_different_users_are_stored_separately() {
        let app = TestApp::spawn().await;
        let alice = app.create_authenticated_user("alice", "securepass").await;
        let bob = app.create_authenticated_user("bob", "securepass").await;
        let bytes = audio_bytes(3, 512);

        let a = app.upload_audio("song.mp3", bytes.clone(), MP3, &alice).await;
        let b = app.upload_audio("song.mp3", bytes, MP3, &bob).await;

        assert_eq!(a.status, 201);
        assert_eq!(b.status, 201);
        assert_ne!(a.file_id(), b.file_id());
        assert_eq!(b.body["file"]["storage_key"], "StaticAudio/bob/song.mp3");
    }

    #[tokio::test]
    async fn non_audio_file_is_rejected() {
        let app = TestApp::spawn().await;
        let token = app.create_authenticated_user("alice", "securepass").await;

        let res = app
            .upload_audio("notes.txt", b"hello".to_vec(), "text/plain", &token)
            .await;

        assert_eq!(res.status, 415);
        assert_eq!(res.body["code"], "UNSUPPORTED_MEDIA_TYPE");
    }

    #[tokio::test]
    async fn file_over_the_size_limit_is_rejected() {
        let app = TestApp::spawn().await;
        let token = app.create_authenticated_user("alice", "securepass").await;
        let too_big = (TEST_MAX_FILE_SIZE_MB * 1024 * 1024) as usize + 1;

        let res = app
            .upload_audio("long.mp3", audio_bytes(9, too_big), MP3, &token)
            .await;

        assert_eq!(res.status, 413);
        assert_eq!(res.body["code"], "PAYLOAD_TOO_LARGE");
        assert!(!app.object_exists("StaticAudio/alice/long.mp3").await);
    }

    #[tokio::test]
    async fn upload_requires_a_token() {
        let app = TestApp::spawn().await;

        let res = app
            .client
            .post(format!("http://{}{}", app.addr, routes::AUDIO))
            .multipart(reqwest::multipart::Form::new().part(
                "file",
                reqwest::multipart::Part::bytes(audio_bytes(1, 16)).file_name("song.mp3"),
            ))
            .send()
            .await
            .expect("Failed to send request");

        assert_eq!(res.status().as_u16(), 401);
    }
}

mod access {
    use super::*;

    #[tokio::test]
    async fn owner_can_fetch_metadata_and_download_url() {
        let app = TestApp::spawn().await;
        let token = app.create_authenticated_user("alice", "securepass").await;
        let up = app
            .upload_audio("song.mp3", audio_bytes(1, 256), MP3, &token)
            .await;
        let id = up.file_id();

        let meta = app.get_with_token(&routes::audio(id), &token).await;
        assert_eq!(meta.status, 200);
        assert_eq!(meta.body["storage_key"], "StaticAudio/alice/song.mp3");

        let dl = app.get_with_token(&routes::audio_download(id), &token).await;
        assert_eq!(dl.status, 200);
        assert!(dl.body["url"].as_str().unwrap().ends_with("song.mp3"));
        assert_eq!(dl.body["expires_in"], 3600);
    }

    #[tokio::test]
    async fn other_users_files_are_not_found() {
        let app = TestApp::spawn().await;
        let alice = app.create_authenticated_user("alice", "securepass").await;
        let bob = app.create_authenticated_user("bob", "securepass").await;
        let id = app
            .upload_audio("song.mp3", audio_bytes(1, 256), MP3, &alice)
            .await
            .file_id();

        assert_eq!(app.get_with_token(&routes::audio(id), &bob).await.status, 404);
        assert_eq!(
            app.get_with_token(&routes::audio_download(id), &bob)
                .await
                .status,
            404
        );
        let del = app.delete_with_token(&routes::audio(id), &bob).await;
        assert_eq!(del.status, 404);
        assert_eq!(del.body["code"], "NOT_FOUND");
        assert!(app.object_exists("StaticAudio/alice/song.mp3").await);

        let list = app.get_with_token(routes::AUDIO, &bob).await;
        assert_eq!(list.body["data"].as_array().unwrap().len(), 0);
    }

    #[tokio::test]
    async fn list_returns_newest_first() {
        let app = TestApp::spawn().await;
        let token = app.create_authenticated_user("alice", "securepass").await;
        for (seed, name) in [(1, "a.mp3"), (2, "b.wav"), (3, "c.flac")] {
            let res = app
                .upload_audio(name, audio_bytes(seed, 128), MP3, &token)
                .await;
            assert_eq!(res.status, 201, "Upload of {name} failed: {}", res.text);
        }

        let res = app.get_with_token(routes::AUDIO, &token).await;

        assert_eq!(res.status, 200);
        let names: Vec<&str> = res.body["data"]
            .as_array()
            .unwrap()
            .iter()
            .map(|f| f["original_name"].as_str().unwrap())
            .collect();
        assert_eq!(names, ["c.flac", "b.wav", "a.mp3"]);
    }
}

mod deletion {
    use super::*;

    #[tokio::test]
    async fn delete_removes_record_and_object() {
        let app = TestApp::spawn().await;
        let token = app.create_authenticated_user("alice", "securepass").await;
        let id = app
            .upload_audio("song.mp3", audio_bytes(1, 256), MP3, &token)
            .await
            .file_id();

        let res = app.delete_with_token(&routes::audio(id), &token).await;

        assert_eq!(res.status, 200, "Delete failed: {}", res.text);
        assert!(!app.object_exists("StaticAudio/alice/song.mp3").await);
        assert_eq!(app.get_with_token(&routes::audio(id), &token).await.status, 404);
        assert_eq!(
            app.delete_with_token(&routes::audio(id), &token).await.status,
            404
        );
    }

    #[tokio::test]
    async fn deleted_content_can_be_uploaded_again() {
        let app = TestApp::spawn().await;
        let token = app.create_authenticated_user("alice", "securepass").await;
        let bytes = audio_bytes(5, 256);
        let id = app
            .upload_audio("song.mp3", bytes.clone(), MP3, &token)
            .await
            .file_id();
        assert_eq!(
            app.delete_with_token(&routes::audio(id), &token).await.status,
            200
        );

        let again = app.upload_audio("song.mp3", bytes, MP3, &token).await;

        assert_eq!(again.status, 201, "Re-upload failed: {}", again.text);
        assert_eq!(again.body["duplicate"], false);
        assert_eq!(again.body["file"]["storage_key"], "StaticAudio/alice/song.mp3");
    }
}

mod transcripts {
    use super::*;

    #[tokio::test]
    async fn transcription_is_rejected_when_disabled() {
        let app = TestApp::spawn().await;
        let token = app.create_authenticated_user("alice", "securepass").await;
        let id = app
            .upload_audio("song.mp3", audio_bytes(1, 256), MP3, &token)
            .await
            .file_id();

        let res = app
            .post_with_token(
                &routes::audio_transcriptions(id),
                &serde_json::json!({}),
                &token,
            )
            .await;

        assert_eq!(res.status, 400);
        assert_eq!(res.body["code"], "TRANSCRIPTION_DISABLED");
    }

    #[tokio::test]
    async fn transcript_listing_starts_empty() {
        let app = TestApp::spawn().await;
        let token = app.create_authenticated_user("alice", "securepass").await;

        let res = app.get_with_token(routes::TRANSCRIPTS, &token).await;

        assert_eq!(res.status, 200, "List failed: {}", res.text);
        assert_eq!(res.body["data"].as_array().unwrap().len(), 0);
    }

    #[tokio::test]
    async fn stored_transcript_is_listed_and_deletable_by_its_owner_only() {
        let app = TestApp::spawn().await;
        let alice = app.create_authenticated_user("alice", "securepass").await;
        let bob = app.create_authenticated_user("bob", "securepass").await;
        let key = "StaticTranscription/alice/song.json";
        app.put_object(key, br#"{"text":"hello"}"#).await;

        let list = app.get_with_token(routes::TRANSCRIPTS, &alice).await;
        assert_eq!(list.body["data"][0]["key"], key);

        let foreign = app.delete_with_token(&routes::transcript(key), &bob).await;
        assert_eq!(foreign.status, 404);
        assert!(app.object_exists(key).await);

        let own = app.delete_with_token(&routes::transcript(key), &alice).await;
        assert_eq!(own.status, 200, "Delete failed: {}", own.text);
        assert!(!app.object_exists(key).await);

        let gone = app.delete_with_token(&routes::transcript(key), &alice).await;
        assert_eq!(gone.status, 404);
    }

    #[tokio::test]
    async fn unknown_job_is_not_found() {
        let app = TestApp::spawn().await;
        let token = app.create_authenticated_user("alice", "securepass").await;

        let res = app
            .get_with_token(&routes::transcription(uuid::Uuid::now_v7()), &token)
            .await;

        assert_eq!(res.status, 404);
    }
}
