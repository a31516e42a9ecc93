//! The on-disk artifact hierarchy.
//!
//! Artifacts live at `<data_root>/wave<N>/<channel-name>/<practice-id>/<file>`
//! where the filename is fixed per channel (`email.html`, `fax.pdf`,
//! `letter.pdf`). The layout is bidirectional: paths are computed from keys,
//! and keys are recovered from paths by the dispatcher.

use std::io;
use std::path::{Path, PathBuf};

use crate::types::{Channel, InterventionKey, PracticeId, Wave};

/// Resolves artifact locations under a data root.
#[derive(Debug, Clone)]
pub struct ArtifactLayout {
    data_root: PathBuf,
}

impl ArtifactLayout {
    pub fn new(data_root: impl Into<PathBuf>) -> Self {
        ArtifactLayout {
            data_root: data_root.into(),
        }
    }

    pub fn data_root(&self) -> &Path {
        &self.data_root
    }

    /// The per-record directory for an intervention.
    pub fn message_dir(&self, key: &InterventionKey) -> PathBuf {
        self.data_root
            .join(key.wave.dir_name())
            .join(key.channel.name())
            .join(key.practice_id.as_str())
    }

    /// The artifact file path for an intervention.
    pub fn message_path(&self, key: &InterventionKey) -> PathBuf {
        self.message_dir(key).join(key.channel.artifact_filename())
    }

    /// Creates the per-record directory if absent (idempotent).
    pub fn ensure_message_dir(&self, key: &InterventionKey) -> io::Result<PathBuf> {
        let dir = self.message_dir(key);
        std::fs::create_dir_all(&dir)?;
        Ok(dir)
    }

    /// The combined printable output for a wave's post letters.
    pub fn combined_letters_path(&self, wave: Wave) -> PathBuf {
        self.data_root
            .join(wave.dir_name())
            .join("combined_letters.pdf")
    }

    /// Recovers the intervention key encoded in an artifact path.
    ///
    /// Accepts either the artifact file itself or its directory. Returns
    /// `None` for paths outside the layout or with unrecognizable
    /// components.
    pub fn resolve_key(&self, path: &Path) -> Option<InterventionKey> {
        let relative = path.strip_prefix(&self.data_root).ok()?;
        let mut components = relative
            .components()
            .map(|c| c.as_os_str().to_str())
            .collect::<Option<Vec<_>>>()?
            .into_iter();

        let wave_dir = components.next()?;
        let wave: Wave = wave_dir.strip_prefix("wave")?.parse().ok()?;

        let channel_name = components.next()?;
        let channel = Channel::ALL
            .into_iter()
            .find(|c| c.name() == channel_name)?;

        let practice = components.next()?;
        if practice.is_empty() {
            return None;
        }

        // Anything after the practice directory must be the channel's
        // artifact file
        if let Some(file) = components.next() {
            if file != channel.artifact_filename() {
                return None;
            }
        }

        Some(InterventionKey::new(channel, wave, PracticeId::new(practice)))
    }

    /// Lists the artifact files present on disk for one wave and channel.
    pub fn existing_artifacts(&self, wave: Wave, channel: Channel) -> io::Result<Vec<PathBuf>> {
        let base = self.data_root.join(wave.dir_name()).join(channel.name());
        let mut found = Vec::new();

        let entries = match std::fs::read_dir(&base) {
            Ok(entries) => entries,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(found),
            Err(e) => return Err(e),
        };

        for entry in entries {
            let entry = entry?;
            if !entry.file_type()?.is_dir() {
                continue;
            }
            let artifact = entry.path().join(channel.artifact_filename());
            if artifact.exists() {
                found.push(artifact);
            }
        }

        found.sort();
        Ok(found)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn key(channel: Channel, wave: u8, practice: &str) -> InterventionKey {
        InterventionKey::new(channel, Wave(wave), PracticeId::new(practice))
    }

    #[test]
    fn message_path_encodes_wave_channel_practice() {
        let layout = ArtifactLayout::new("/data");
        let path = layout.message_path(&key(Channel::Fax, 2, "A83050"));
        assert_eq!(path, PathBuf::from("/data/wave2/fax/A83050/fax.pdf"));
    }

    #[test]
    fn resolve_key_inverts_message_path() {
        let layout = ArtifactLayout::new("/data");
        for channel in Channel::ALL {
            for wave in 1..=3 {
                let k = key(channel, wave, "A83050");
                let path = layout.message_path(&k);
                assert_eq!(layout.resolve_key(&path), Some(k.clone()));
                assert_eq!(layout.resolve_key(&layout.message_dir(&k)), Some(k));
            }
        }
    }

    #[test]
    fn resolve_key_rejects_foreign_paths() {
        let layout = ArtifactLayout::new("/data");
        assert_eq!(layout.resolve_key(Path::new("/elsewhere/wave1/fax/A1/fax.pdf")), None);
        assert_eq!(layout.resolve_key(Path::new("/data/wave1/telegraph/A1")), None);
        assert_eq!(layout.resolve_key(Path::new("/data/nowave/fax/A1")), None);
        // wrong artifact filename for the channel
        assert_eq!(
            layout.resolve_key(Path::new("/data/wave1/fax/A1/letter.pdf")),
            None
        );
    }

    #[test]
    fn ensure_message_dir_is_idempotent() {
        let dir = tempdir().unwrap();
        let layout = ArtifactLayout::new(dir.path());
        let k = key(Channel::Post, 1, "A83050");

        let first = layout.ensure_message_dir(&k).unwrap();
        let second = layout.ensure_message_dir(&k).unwrap();
        assert_eq!(first, second);
        assert!(first.is_dir());
    }

    #[test]
    fn existing_artifacts_lists_only_present_files() {
        let dir = tempdir().unwrap();
        let layout = ArtifactLayout::new(dir.path());

        let k1 = key(Channel::Post, 1, "A83050");
        let k2 = key(Channel::Post, 1, "B11111");
        layout.ensure_message_dir(&k1).unwrap();
        layout.ensure_message_dir(&k2).unwrap();
        std::fs::write(layout.message_path(&k1), b"%PDF").unwrap();
        // k2 has a directory but no artifact file

        let found = layout.existing_artifacts(Wave::ONE, Channel::Post).unwrap();
        assert_eq!(found, vec![layout.message_path(&k1)]);
    }

    #[test]
    fn existing_artifacts_empty_for_missing_tree() {
        let dir = tempdir().unwrap();
        let layout = ArtifactLayout::new(dir.path());
        assert!(
            layout
                .existing_artifacts(Wave(3), Channel::Fax)
                .unwrap()
                .is_empty()
        );
    }
}
