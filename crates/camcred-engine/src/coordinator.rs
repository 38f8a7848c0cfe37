use std::fs;
use std::path::PathBuf;
use std::sync::Arc;

use camcred_core::assets::{MediaAsset, Movie, Photo, SignableAsset};
use camcred_core::errors::{EmbedError, SignError};
use camcred_core::identity::SigningIdentity;
use camcred_core::manifest::{ManifestBuilder, ManifestDescription};
use camcred_core::metadata::MetadataResolver;
use camcred_core::traits::Embedder;

use crate::scratch::{ScratchArea, ScratchArtifact};

/// Signs assets end to end, falling back to the input on any failure.
///
/// Every public `sign*` method is total: the caller gets either a signed
/// asset or exactly the value it passed in, and no scratch file from the
/// call survives except one adopted as a movie's new backing file.
pub struct SigningCoordinator {
    embedder: Arc<dyn Embedder>,
    identity: Arc<SigningIdentity>,
    resolver: MetadataResolver,
    builder: ManifestBuilder,
    scratch_dir: Option<PathBuf>,
}

impl SigningCoordinator {
    pub fn new(embedder: Arc<dyn Embedder>, identity: Arc<SigningIdentity>) -> Self {
        Self {
            embedder,
            identity,
            resolver: MetadataResolver::system(),
            builder: ManifestBuilder::default(),
            scratch_dir: None,
        }
    }

    pub fn with_resolver(mut self, resolver: MetadataResolver) -> Self {
        self.resolver = resolver;
        self
    }

    pub fn with_manifest_builder(mut self, builder: ManifestBuilder) -> Self {
        self.builder = builder;
        self
    }

    /// Put scratch files under `dir` instead of the user cache directory.
    pub fn with_scratch_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.scratch_dir = Some(dir.into());
        self
    }

    /// Manifest that signing `asset` would embed.
    pub fn manifest_for(
        &self,
        asset: &dyn SignableAsset,
    ) -> Result<ManifestDescription, SignError> {
        let metadata = self.resolver.resolve(asset)?;
        Ok(self.builder.build_for(&metadata)?)
    }

    pub fn sign(&self, asset: MediaAsset) -> MediaAsset {
        match asset {
            MediaAsset::Photo(photo) => MediaAsset::Photo(self.sign_photo(photo)),
            MediaAsset::Movie(movie) => MediaAsset::Movie(self.sign_movie(movie)),
        }
    }

    /// Sign a photo and, after it, its live-photo companion.
    ///
    /// The companion is signed independently: its failure leaves the original
    /// companion reference in place. If the photo itself falls back, the
    /// original photo is returned whole and any signed companion is dropped.
    pub fn sign_photo(&self, photo: Photo) -> Photo {
        let (scratch, manifest) = match self.prepare(&photo) {
            Ok(prepared) => prepared,
            Err(e) => {
                log_fallback("photo", &e);
                return photo;
            }
        };

        let primary = self.sign_photo_data(&scratch, &manifest, &photo);

        let companion = photo
            .live_photo_movie()
            .and_then(|movie| self.sign_companion(&scratch, movie));

        let data = match primary {
            Ok(data) => data,
            Err(e) => {
                log_fallback("photo", &e);
                if companion.is_some() {
                    tracing::info!("discarding signed companion of unsigned photo");
                }
                return photo;
            }
        };

        let live_photo_movie = match (companion, photo.live_photo_movie()) {
            (Some(artifact), Some(original)) => Some(adopt_movie(artifact, original)),
            (_, original) => original.cloned(),
        };
        tracing::info!(title = manifest.title(), "photo signed");
        Photo::new(data, live_photo_movie, photo.timestamp())
    }

    /// Sign a movie. On success the scratch output becomes the movie's new
    /// location and the original file is deleted.
    pub fn sign_movie(&self, movie: Movie) -> Movie {
        let signed = self
            .prepare(&movie)
            .and_then(|(scratch, manifest)| self.embed_to_scratch(&scratch, &manifest, &movie));

        match signed {
            Ok(artifact) => {
                let signed = adopt_movie(artifact, &movie);
                tracing::info!(path = %signed.path().display(), "movie signed");
                signed
            }
            Err(e) => {
                log_fallback("movie", &e);
                movie
            }
        }
    }

    fn prepare(
        &self,
        asset: &dyn SignableAsset,
    ) -> Result<(ScratchArea, ManifestDescription), SignError> {
        let scratch = ScratchArea::resolve(self.scratch_dir.as_deref())?;
        let manifest = self.manifest_for(asset)?;
        Ok((scratch, manifest))
    }

    fn sign_photo_data(
        &self,
        scratch: &ScratchArea,
        manifest: &ManifestDescription,
        photo: &Photo,
    ) -> Result<Vec<u8>, SignError> {
        let artifact = self.embed_to_scratch(scratch, manifest, photo)?;
        let data = artifact.read_back()?;
        if data == photo.data() {
            return Err(SignError::InvalidOutput(
                "embedder returned the photo unchanged".into(),
            ));
        }
        Ok(data)
    }

    /// Sign a live-photo companion; `None` means it stays as it was.
    fn sign_companion(&self, scratch: &ScratchArea, movie: &Movie) -> Option<ScratchArtifact> {
        let signed = self
            .manifest_for(movie)
            .and_then(|manifest| self.embed_to_scratch(scratch, &manifest, movie));
        match signed {
            Ok(artifact) => Some(artifact),
            Err(e) => {
                log_fallback("companion", &e);
                None
            }
        }
    }

    fn embed_to_scratch(
        &self,
        scratch: &ScratchArea,
        manifest: &ManifestDescription,
        asset: &dyn SignableAsset,
    ) -> Result<ScratchArtifact, SignError> {
        let (artifact, mut destination) = scratch.create(manifest.title())?;

        if tracing::enabled!(tracing::Level::DEBUG) {
            match manifest.to_json() {
                Ok(json) => tracing::debug!(
                    path = %artifact.path().display(),
                    manifest = %json,
                    "embedding manifest"
                ),
                Err(e) => tracing::debug!(title = manifest.title(), error = %e, "manifest not printable"),
            }
        }

        let mut source = asset.raw_readable_stream().map_err(EmbedError::Io)?;
        self.identity.ensure_usable()?;
        self.embedder
            .embed(manifest, &mut *source, &mut destination, &self.identity)?;
        destination.sync_all().map_err(EmbedError::Io)?;

        let written = destination.metadata().map_err(EmbedError::Io)?.len();
        if written == 0 {
            return Err(SignError::InvalidOutput("embedder wrote no bytes".into()));
        }
        Ok(artifact)
    }
}

/// Adopt a signed movie's scratch file and retire the file it replaces.
fn adopt_movie(artifact: ScratchArtifact, original: &Movie) -> Movie {
    let path = artifact.adopt();
    if let Err(e) = fs::remove_file(original.path()) {
        tracing::warn!(
            path = %original.path().display(),
            error = %e,
            "cannot remove unsigned original movie"
        );
    }
    Movie::new(path)
}

fn log_fallback(asset: &str, err: &SignError) {
    match err {
        SignError::MetadataUnavailable(_) => tracing::warn!(
            asset,
            stage = err.stage(),
            error = %err,
            "not signing, returning original"
        ),
        _ => tracing::error!(
            asset,
            stage = err.stage(),
            error = %err,
            "signing failed, returning original"
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{self, Read, Write};
    use std::path::Path;
    use std::sync::Mutex;

    use camcred_core::assets::{CaptureTime, ReadSeek, ReadWriteSeek};
    use camcred_core::identity::SigningAlg;
    use camcred_core::metadata::FixedClock;
    use chrono::{FixedOffset, TimeZone, Utc};

    const JPEG: &[u8] = &[0xFF, 0xD8, 0xFF, 0xE0, 0x00, 0x10, b'J', b'F', b'I', b'F', 0xFF, 0xD9];
    const MOVIE: &[u8] = b"\0\0\0\x14ftypqt  \0\0\0\0moov-and-mdat";
    const SIGNED_MARK: &[u8] = b"|signed";

    /// What a fake embedder does with each call.
    #[derive(Clone, Copy)]
    enum Behavior {
        Append,
        Fail,
        /// Write half the source, then fail.
        FailMidway,
        Unchanged,
        Empty,
    }

    struct FakeEmbedder {
        default: Behavior,
        per_format: Vec<(&'static str, Behavior)>,
        calls: Mutex<Vec<String>>,
    }

    impl FakeEmbedder {
        fn new(default: Behavior) -> Self {
            Self {
                default,
                per_format: Vec::new(),
                calls: Mutex::new(Vec::new()),
            }
        }

        fn on_format(mut self, format: &'static str, behavior: Behavior) -> Self {
            self.per_format.push((format, behavior));
            self
        }

        fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }
    }

    impl Embedder for FakeEmbedder {
        fn embed(
            &self,
            manifest: &ManifestDescription,
            source: &mut dyn ReadSeek,
            destination: &mut dyn ReadWriteSeek,
            _identity: &SigningIdentity,
        ) -> Result<(), EmbedError> {
            self.calls.lock().unwrap().push(manifest.format().to_string());
            let behavior = self
                .per_format
                .iter()
                .find(|(format, _)| *format == manifest.format())
                .map(|(_, b)| *b)
                .unwrap_or(self.default);

            let mut input = Vec::new();
            source.read_to_end(&mut input)?;
            match behavior {
                Behavior::Append => {
                    destination.write_all(&input)?;
                    destination.write_all(SIGNED_MARK)?;
                    Ok(())
                }
                Behavior::Fail => Err(EmbedError::Internal("refused".into())),
                Behavior::FailMidway => {
                    destination.write_all(&input[..input.len() / 2])?;
                    Err(EmbedError::Io(io::Error::other("disk full")))
                }
                Behavior::Unchanged => {
                    destination.write_all(&input)?;
                    Ok(())
                }
                Behavior::Empty => Ok(()),
            }
        }
    }

    struct Fixture {
        dir: tempfile::TempDir,
        embedder: Arc<FakeEmbedder>,
        coordinator: SigningCoordinator,
    }

    impl Fixture {
        fn new(embedder: FakeEmbedder) -> Self {
            Self::with_identity(embedder, SigningIdentity::new(SigningAlg::Es256, "CERT", "KEY"))
        }

        fn with_identity(embedder: FakeEmbedder, identity: SigningIdentity) -> Self {
            let dir = tempfile::tempdir().unwrap();
            let embedder = Arc::new(embedder);
            let clock = FixedClock::new(Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap(), 0.0);
            let resolver =
                MetadataResolver::new(Box::new(clock), FixedOffset::east_opt(0).unwrap());
            let coordinator = SigningCoordinator::new(embedder.clone(), Arc::new(identity))
                .with_resolver(resolver)
                .with_scratch_dir(dir.path().join("scratch"));
            Self {
                dir,
                embedder,
                coordinator,
            }
        }

        fn scratch(&self) -> PathBuf {
            self.dir.path().join("scratch")
        }

        fn scratch_entries(&self) -> Vec<String> {
            match fs::read_dir(self.scratch()) {
                Ok(entries) => entries
                    .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
                    .collect(),
                Err(_) => Vec::new(),
            }
        }

        fn write_movie(&self, name: &str, bytes: &[u8]) -> Movie {
            let path = self.dir.path().join(name);
            fs::write(&path, bytes).unwrap();
            Movie::new(path)
        }
    }

    fn photo(companion: Option<Movie>) -> Photo {
        Photo::new(JPEG.to_vec(), companion, CaptureTime::from_seconds(0.0))
    }

    fn signed(bytes: &[u8]) -> Vec<u8> {
        [bytes, SIGNED_MARK].concat()
    }

    fn in_dir(path: &Path, dir: &Path) -> bool {
        path.parent() == Some(dir)
    }

    // ── Photo ───────────────────────────────────────────────────

    #[test]
    fn photo_signed_and_scratch_removed() {
        let fx = Fixture::new(FakeEmbedder::new(Behavior::Append));
        let manifest = fx.coordinator.manifest_for(&photo(None)).unwrap();
        assert_eq!(manifest.title(), "c2pa-cam_2025-01-01T00.00.00.000Z.jpg");

        let result = fx.coordinator.sign_photo(photo(None));
        assert_eq!(result.data(), signed(JPEG).as_slice());
        assert_ne!(result.data(), JPEG);
        assert!(result.live_photo_movie().is_none());
        assert_eq!(result.timestamp(), CaptureTime::from_seconds(0.0));
        assert!(fx.scratch_entries().is_empty());
    }

    #[test]
    fn photo_embed_failure_returns_original() {
        let fx = Fixture::new(FakeEmbedder::new(Behavior::FailMidway));
        let original = photo(None);
        assert_eq!(fx.coordinator.sign_photo(original.clone()), original);
        assert!(fx.scratch_entries().is_empty());
    }

    #[test]
    fn empty_identity_fails_before_embedder_runs() {
        let fx = Fixture::with_identity(
            FakeEmbedder::new(Behavior::Append),
            SigningIdentity::new(SigningAlg::Es256, "", ""),
        );
        let original = photo(None);
        assert_eq!(fx.coordinator.sign_photo(original.clone()), original);
        assert!(fx.embedder.calls().is_empty());
        assert!(fx.scratch_entries().is_empty());
    }

    #[test]
    fn undetectable_photo_passes_through() {
        let fx = Fixture::new(FakeEmbedder::new(Behavior::Append));
        let original = Photo::new(b"not an image".to_vec(), None, CaptureTime::from_seconds(0.0));
        assert_eq!(fx.coordinator.sign_photo(original.clone()), original);
        assert!(fx.embedder.calls().is_empty());
    }

    #[test]
    fn missing_scratch_area_passes_through() {
        let fx = Fixture::new(FakeEmbedder::new(Behavior::Append));
        let blocker = fx.dir.path().join("blocker");
        fs::write(&blocker, b"file, not dir").unwrap();
        let coordinator = SigningCoordinator::new(
            fx.embedder.clone(),
            Arc::new(SigningIdentity::new(SigningAlg::Es256, "CERT", "KEY")),
        )
        .with_scratch_dir(&blocker);
        let original = photo(None);
        assert_eq!(coordinator.sign_photo(original.clone()), original);
        assert!(fx.embedder.calls().is_empty());
    }

    #[test]
    fn unchanged_output_is_rejected() {
        let fx = Fixture::new(FakeEmbedder::new(Behavior::Unchanged));
        let original = photo(None);
        assert_eq!(fx.coordinator.sign_photo(original.clone()), original);
        assert!(fx.scratch_entries().is_empty());
    }

    #[test]
    fn empty_output_is_rejected() {
        let fx = Fixture::new(FakeEmbedder::new(Behavior::Empty));
        let original = photo(None);
        assert_eq!(fx.coordinator.sign_photo(original.clone()), original);
        assert!(fx.scratch_entries().is_empty());
    }

    // ── Live-photo companion ────────────────────────────────────

    #[test]
    fn photo_and_companion_signed() {
        let fx = Fixture::new(FakeEmbedder::new(Behavior::Append));
        let companion = fx.write_movie("live.mov", MOVIE);
        let result = fx.coordinator.sign_photo(photo(Some(companion.clone())));

        assert_eq!(result.data(), signed(JPEG).as_slice());
        let new_companion = result.live_photo_movie().unwrap();
        assert_ne!(new_companion, &companion);
        assert!(in_dir(new_companion.path(), &fx.scratch()));
        assert_eq!(fs::read(new_companion.path()).unwrap(), signed(MOVIE));
        assert!(!companion.path().exists());

        let name = new_companion.path().file_name().unwrap().to_str().unwrap();
        assert_eq!(fx.scratch_entries(), [name]);
        assert!(name.starts_with("c2pa-cam_") && name.ends_with(".mov"));
    }

    #[test]
    fn primary_signed_before_companion() {
        let fx = Fixture::new(FakeEmbedder::new(Behavior::Append));
        let companion = fx.write_movie("live.mov", MOVIE);
        fx.coordinator.sign_photo(photo(Some(companion)));
        assert_eq!(fx.embedder.calls(), ["image/jpeg", "video/quicktime"]);
    }

    #[test]
    fn companion_titled_by_its_own_modification_time() {
        let fx = Fixture::new(FakeEmbedder::new(Behavior::Append));
        let companion = fx.write_movie("live.mov", MOVIE);
        let modified = Utc.with_ymd_and_hms(2024, 6, 1, 12, 30, 0).unwrap();
        fs::File::options()
            .write(true)
            .open(companion.path())
            .unwrap()
            .set_modified(modified.into())
            .unwrap();

        let result = fx.coordinator.sign_photo(photo(Some(companion)));
        let name = result
            .live_photo_movie()
            .unwrap()
            .path()
            .file_name()
            .unwrap()
            .to_str()
            .unwrap()
            .to_string();
        assert_eq!(name, "c2pa-cam_2024-06-01T12.30.00.000Z.mov");
    }

    #[test]
    fn companion_without_metadata_left_unchanged() {
        let fx = Fixture::new(FakeEmbedder::new(Behavior::Append));
        let companion = fx.write_movie("live.bin", b"opaque bytes");
        let result = fx.coordinator.sign_photo(photo(Some(companion.clone())));

        assert_eq!(result.data(), signed(JPEG).as_slice());
        assert_eq!(result.live_photo_movie(), Some(&companion));
        assert_eq!(fs::read(companion.path()).unwrap(), b"opaque bytes");
        assert_eq!(fx.embedder.calls(), ["image/jpeg"]);
        assert!(fx.scratch_entries().is_empty());
    }

    #[test]
    fn companion_embed_failure_keeps_signed_primary() {
        let fx = Fixture::new(
            FakeEmbedder::new(Behavior::Append).on_format("video/quicktime", Behavior::FailMidway),
        );
        let companion = fx.write_movie("live.mov", MOVIE);
        let result = fx.coordinator.sign_photo(photo(Some(companion.clone())));

        assert_eq!(result.data(), signed(JPEG).as_slice());
        assert_eq!(result.live_photo_movie(), Some(&companion));
        assert_eq!(fs::read(companion.path()).unwrap(), MOVIE);
        assert!(fx.scratch_entries().is_empty());
    }

    #[test]
    fn primary_failure_discards_signed_companion() {
        let fx = Fixture::new(
            FakeEmbedder::new(Behavior::Append).on_format("image/jpeg", Behavior::Fail),
        );
        let companion = fx.write_movie("live.mov", MOVIE);
        let original = photo(Some(companion.clone()));
        let result = fx.coordinator.sign_photo(original.clone());

        assert_eq!(result, original);
        assert_eq!(fx.embedder.calls(), ["image/jpeg", "video/quicktime"]);
        assert_eq!(fs::read(companion.path()).unwrap(), MOVIE);
        assert!(fx.scratch_entries().is_empty());
    }

    // ── Movie ───────────────────────────────────────────────────

    #[test]
    fn movie_signed_in_scratch_and_original_removed() {
        let fx = Fixture::new(FakeEmbedder::new(Behavior::Append));
        let movie = fx.write_movie("clip.mov", MOVIE);
        let result = fx.coordinator.sign_movie(movie.clone());

        assert_ne!(result, movie);
        assert!(in_dir(result.path(), &fx.scratch()));
        assert_eq!(fs::read(result.path()).unwrap(), signed(MOVIE));
        assert!(!movie.path().exists());
        assert_eq!(fx.scratch_entries().len(), 1);
    }

    #[test]
    fn movie_failure_keeps_original() {
        let fx = Fixture::new(FakeEmbedder::new(Behavior::FailMidway));
        let movie = fx.write_movie("clip.mov", MOVIE);
        assert_eq!(fx.coordinator.sign_movie(movie.clone()), movie);
        assert_eq!(fs::read(movie.path()).unwrap(), MOVIE);
        assert!(fx.scratch_entries().is_empty());
    }

    #[test]
    fn missing_movie_file_passes_through() {
        let fx = Fixture::new(FakeEmbedder::new(Behavior::Append));
        let movie = Movie::new(fx.dir.path().join("vanished.mov"));
        assert_eq!(fx.coordinator.sign_movie(movie.clone()), movie);
        assert!(fx.scratch_entries().is_empty());
    }

    #[test]
    fn sign_dispatches_on_variant() {
        let fx = Fixture::new(FakeEmbedder::new(Behavior::Append));
        match fx.coordinator.sign(MediaAsset::from(photo(None))) {
            MediaAsset::Photo(p) => assert_eq!(p.data(), signed(JPEG).as_slice()),
            other => panic!("expected photo, got {other:?}"),
        }
        let movie = fx.write_movie("clip.mov", MOVIE);
        match fx.coordinator.sign(MediaAsset::from(movie)) {
            MediaAsset::Movie(m) => assert_eq!(fs::read(m.path()).unwrap(), signed(MOVIE)),
            other => panic!("expected movie, got {other:?}"),
        }
    }

    // ── Concurrency ─────────────────────────────────────────────

    #[test]
    fn concurrent_calls_with_identical_titles() {
        use std::sync::Barrier;
        use std::thread;

        let fx = Arc::new(Fixture::new(FakeEmbedder::new(Behavior::Append)));
        let barrier = Arc::new(Barrier::new(8));
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let fx = Arc::clone(&fx);
                let b = Arc::clone(&barrier);
                thread::spawn(move || {
                    b.wait();
                    fx.coordinator.sign_photo(photo(None))
                })
            })
            .collect();

        for h in handles {
            assert_eq!(h.join().unwrap().data(), signed(JPEG).as_slice());
        }
        assert_eq!(fx.embedder.calls().len(), 8);
        assert!(fx.scratch_entries().is_empty());
    }
}
