use std::fs::File;
use std::io::{self, Cursor, Read, Seek, Write};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};

use crate::content_type::{ContentType, SNIFF_LEN};
use crate::metadata::HostClock;

/// Readable, seekable source stream handed to an embedder.
pub trait ReadSeek: Read + Seek + Send {}
impl<T: Read + Seek + Send> ReadSeek for T {}

/// Destination stream handed to an embedder. Embedders may read back what
/// they wrote, so destinations are readable too.
pub trait ReadWriteSeek: Read + Write + Seek + Send {}
impl<T: Read + Write + Seek + Send> ReadWriteSeek for T {}

/// Capture instant on the host clock, in seconds.
///
/// The same time base as [`HostClock::host_seconds`]; it is converted to
/// wall-clock time when a manifest is built.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CaptureTime {
    pub seconds: f64,
}

impl CaptureTime {
    pub fn from_seconds(seconds: f64) -> Self {
        Self { seconds }
    }

    /// Capture time for an instant already known in wall-clock time.
    pub fn at_wall_time(clock: &dyn HostClock, wall: DateTime<Utc>) -> Self {
        let behind = clock.wall_now() - wall;
        let behind_secs = behind
            .num_microseconds()
            .map(|us| us as f64 / 1_000_000.0)
            .unwrap_or(behind.num_seconds() as f64);
        Self::from_seconds(clock.host_seconds() - behind_secs)
    }

    pub fn is_valid(&self) -> bool {
        self.seconds.is_finite()
    }
}

/// A standalone video clip, or a photo's live-motion companion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Movie {
    path: PathBuf,
}

impl Movie {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// A still photo held in memory, with an optional live-photo companion.
#[derive(Debug, Clone, PartialEq)]
pub struct Photo {
    data: Vec<u8>,
    live_photo_movie: Option<Movie>,
    timestamp: CaptureTime,
}

impl Photo {
    pub fn new(data: Vec<u8>, live_photo_movie: Option<Movie>, timestamp: CaptureTime) -> Self {
        Self {
            data,
            live_photo_movie,
            timestamp,
        }
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn into_data(self) -> Vec<u8> {
        self.data
    }

    pub fn live_photo_movie(&self) -> Option<&Movie> {
        self.live_photo_movie.as_ref()
    }

    pub fn timestamp(&self) -> CaptureTime {
        self.timestamp
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum MediaAsset {
    Photo(Photo),
    Movie(Movie),
}

impl From<Photo> for MediaAsset {
    fn from(photo: Photo) -> Self {
        MediaAsset::Photo(photo)
    }
}

impl From<Movie> for MediaAsset {
    fn from(movie: Movie) -> Self {
        MediaAsset::Movie(movie)
    }
}

/// What the signing pipeline needs from any asset variant.
pub trait SignableAsset {
    /// Open the asset's raw bytes for reading, positioned at the start.
    fn raw_readable_stream(&self) -> io::Result<Box<dyn ReadSeek + '_>>;

    /// Best guess at the asset's content type, if any can be made.
    fn content_type_hint(&self) -> Option<ContentType>;

    /// Wall-clock capture time, if known.
    fn timestamp_hint(&self, clock: &dyn HostClock) -> Option<DateTime<Utc>>;
}

impl SignableAsset for Photo {
    fn raw_readable_stream(&self) -> io::Result<Box<dyn ReadSeek + '_>> {
        Ok(Box::new(Cursor::new(self.data.as_slice())))
    }

    fn content_type_hint(&self) -> Option<ContentType> {
        ContentType::sniff(&self.data)
    }

    fn timestamp_hint(&self, clock: &dyn HostClock) -> Option<DateTime<Utc>> {
        if !self.timestamp.is_valid() {
            return None;
        }
        let offset = self.timestamp.seconds - clock.host_seconds();
        let offset = chrono::Duration::microseconds((offset * 1_000_000.0).round() as i64);
        clock.wall_now().checked_add_signed(offset)
    }
}

impl SignableAsset for Movie {
    fn raw_readable_stream(&self) -> io::Result<Box<dyn ReadSeek + '_>> {
        Ok(Box::new(File::open(&self.path)?))
    }

    fn content_type_hint(&self) -> Option<ContentType> {
        ContentType::from_path(&self.path).or_else(|| {
            let mut header = Vec::with_capacity(SNIFF_LEN);
            File::open(&self.path)
                .and_then(|f| f.take(SNIFF_LEN as u64).read_to_end(&mut header))
                .ok()?;
            ContentType::sniff(&header)
        })
    }

    fn timestamp_hint(&self, _clock: &dyn HostClock) -> Option<DateTime<Utc>> {
        let modified = std::fs::metadata(&self.path).ok()?.modified().ok()?;
        Some(DateTime::<Utc>::from(modified))
    }
}

impl SignableAsset for MediaAsset {
    fn raw_readable_stream(&self) -> io::Result<Box<dyn ReadSeek + '_>> {
        match self {
            MediaAsset::Photo(photo) => photo.raw_readable_stream(),
            MediaAsset::Movie(movie) => movie.raw_readable_stream(),
        }
    }

    fn content_type_hint(&self) -> Option<ContentType> {
        match self {
            MediaAsset::Photo(photo) => photo.content_type_hint(),
            MediaAsset::Movie(movie) => movie.content_type_hint(),
        }
    }

    fn timestamp_hint(&self, clock: &dyn HostClock) -> Option<DateTime<Utc>> {
        match self {
            MediaAsset::Photo(photo) => photo.timestamp_hint(clock),
            MediaAsset::Movie(movie) => movie.timestamp_hint(clock),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::FixedClock;
    use chrono::TimeZone;

    const JPEG: &[u8] = &[0xFF, 0xD8, 0xFF, 0xE0, 0x00, 0x10, b'J', b'F', b'I', b'F'];

    fn clock() -> FixedClock {
        FixedClock::new(Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 10).unwrap(), 100.0)
    }

    #[test]
    fn photo_stream_yields_buffer() {
        let photo = Photo::new(JPEG.to_vec(), None, CaptureTime::from_seconds(0.0));
        let mut out = Vec::new();
        photo.raw_readable_stream().unwrap().read_to_end(&mut out).unwrap();
        assert_eq!(out, JPEG);
    }

    #[test]
    fn photo_timestamp_reflects_capture_instant() {
        let photo = Photo::new(JPEG.to_vec(), None, CaptureTime::from_seconds(90.0));
        let ts = photo.timestamp_hint(&clock()).unwrap();
        assert_eq!(ts, Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap());
    }

    #[test]
    fn invalid_capture_time_has_no_timestamp() {
        let photo = Photo::new(JPEG.to_vec(), None, CaptureTime::from_seconds(f64::NAN));
        assert!(photo.timestamp_hint(&clock()).is_none());
    }

    #[test]
    fn capture_time_round_trips_wall_time() {
        let clock = clock();
        let wall = Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 4).unwrap();
        let capture = CaptureTime::at_wall_time(&clock, wall);
        assert_eq!(capture.seconds, 94.0);
    }

    #[test]
    fn movie_type_from_extension_then_header() {
        let dir = tempfile::tempdir().unwrap();
        let named = dir.path().join("clip.mov");
        std::fs::write(&named, b"not really a movie").unwrap();
        assert_eq!(
            Movie::new(&named).content_type_hint().unwrap().identifier(),
            ContentType::QUICKTIME_MOVIE
        );

        let unnamed = dir.path().join("clip.bin");
        std::fs::write(&unnamed, b"\0\0\0\x14ftypqt  \0\0\0\0rest").unwrap();
        assert_eq!(
            Movie::new(&unnamed).content_type_hint().unwrap().identifier(),
            ContentType::QUICKTIME_MOVIE
        );
    }

    #[test]
    fn missing_movie_has_no_metadata() {
        let movie = Movie::new("/definitely/not/here.bin");
        assert!(movie.content_type_hint().is_none());
        assert!(movie.timestamp_hint(&clock()).is_none());
        assert!(movie.raw_readable_stream().is_err());
    }
}
