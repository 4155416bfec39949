//! Project discovery and derived output paths.
//!
//! A batch directory holds one subdirectory per project. Each project must
//! contain a main video, an intro still, and an outro still; anything less
//! is a discovery failure that skips the project.

use std::ffi::OsStr;
use std::path::{Path, PathBuf};

use reelbatch_common::config::LayoutConfig;
use reelbatch_common::error::{ReelbatchError, ReelbatchResult};

/// A discovered project with all required inputs present.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Project {
    /// Directory name, used for reporting and the final file name.
    pub name: String,

    /// Project directory.
    pub root: PathBuf,

    /// Main video clip.
    pub main_video: PathBuf,

    /// Intro still image.
    pub intro_image: PathBuf,

    /// Outro still image.
    pub outro_image: PathBuf,

    /// Derived intermediate and output paths.
    pub paths: ProjectPaths,
}

/// Paths derived from a project directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProjectPaths {
    /// Intermediate artifacts.
    pub work_dir: PathBuf,

    /// Final output directory.
    pub final_dir: PathBuf,

    /// Loudness-normalized copy of the main video.
    pub normalized_video: PathBuf,

    /// Composite output file.
    pub final_video: PathBuf,
}

impl ProjectPaths {
    /// Derive the work/final layout for a project directory.
    ///
    /// `name` is kept as raw OS bytes so the final file name matches the
    /// directory name even when it is not valid UTF-8.
    pub fn derive(root: &Path, name: impl AsRef<OsStr>, layout: &LayoutConfig) -> Self {
        let work_dir = root.join(&layout.work_dir_name);
        let final_dir = root.join(&layout.final_dir_name);
        let normalized_video = work_dir.join(&layout.normalized_file_name);

        let mut file_name = name.as_ref().to_os_string();
        file_name.push(&layout.final_suffix);
        file_name.push(".");
        file_name.push(&layout.output_extension);
        let final_video = final_dir.join(file_name);

        Self {
            work_dir,
            final_dir,
            normalized_video,
            final_video,
        }
    }

    /// Create the work and final directories if absent.
    pub fn ensure_dirs(&self) -> ReelbatchResult<()> {
        std::fs::create_dir_all(&self.work_dir)?;
        std::fs::create_dir_all(&self.final_dir)?;
        Ok(())
    }
}

impl Project {
    /// Locate the required inputs inside a project directory.
    ///
    /// The main video is the first file (in lexical order) whose extension
    /// matches one of `layout.video_extensions`. Only the top level of the
    /// directory is searched, so files under the work/final folders are
    /// never picked up.
    pub fn discover(root: impl AsRef<Path>, layout: &LayoutConfig) -> ReelbatchResult<Self> {
        let root = root.as_ref().to_path_buf();
        let name = project_name(&root);

        let main_video = find_main_video(&root, &layout.video_extensions)?
            .ok_or_else(|| ReelbatchError::discovery(&name, "No main video found"))?;

        let intro_image = root.join(&layout.intro_file);
        let outro_image = root.join(&layout.outro_file);
        let missing: Vec<&str> = [
            (&intro_image, layout.intro_file.as_str()),
            (&outro_image, layout.outro_file.as_str()),
        ]
        .into_iter()
        .filter(|(path, _)| !path.is_file())
        .map(|(_, file)| file)
        .collect();
        if !missing.is_empty() {
            return Err(ReelbatchError::discovery(
                &name,
                format!("Missing {}", missing.join(", ")),
            ));
        }

        let dir_name = root.file_name().unwrap_or(root.as_os_str());
        let paths = ProjectPaths::derive(&root, dir_name, layout);
        tracing::debug!(
            project = %name,
            main = %main_video.display(),
            "Project inputs discovered"
        );

        Ok(Self {
            name,
            root,
            main_video,
            intro_image,
            outro_image,
            paths,
        })
    }
}

/// List project directories inside a batch directory, sorted by name.
///
/// Fails with `BatchSetup` if the batch directory itself is missing.
pub fn list_project_dirs(batch_dir: &Path) -> ReelbatchResult<Vec<PathBuf>> {
    if !batch_dir.is_dir() {
        return Err(ReelbatchError::batch_setup(format!(
            "No batch folder found at {}",
            batch_dir.display()
        )));
    }

    let mut dirs = Vec::new();
    for entry in std::fs::read_dir(batch_dir)? {
        let path = entry?.path();
        if path.is_dir() {
            dirs.push(path);
        }
    }
    dirs.sort();
    Ok(dirs)
}

/// Project name as displayed to the user.
pub fn project_name(root: &Path) -> String {
    root.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| root.display().to_string())
}

fn find_main_video(root: &Path, extensions: &[String]) -> ReelbatchResult<Option<PathBuf>> {
    let mut candidates = Vec::new();
    for entry in std::fs::read_dir(root)? {
        let path = entry?.path();
        if !path.is_file() {
            continue;
        }
        let matches = path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| extensions.iter().any(|want| want.eq_ignore_ascii_case(ext)))
            .unwrap_or(false);
        if matches {
            candidates.push(path);
        }
    }
    candidates.sort();
    Ok(candidates.into_iter().next())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn touch(path: &Path) {
        std::fs::write(path, b"").unwrap();
    }

    fn complete_project(parent: &Path, name: &str) -> PathBuf {
        let root = parent.join(name);
        std::fs::create_dir_all(&root).unwrap();
        touch(&root.join("main.mp4"));
        touch(&root.join("intro.png"));
        touch(&root.join("outro.png"));
        root
    }

    #[test]
    fn test_discover_complete_project() {
        let dir = tempfile::tempdir().unwrap();
        let root = complete_project(dir.path(), "Demo");

        let project = Project::discover(&root, &LayoutConfig::default()).unwrap();
        assert_eq!(project.name, "Demo");
        assert_eq!(project.main_video, root.join("main.mp4"));
        assert_eq!(project.intro_image, root.join("intro.png"));
        assert_eq!(
            project.paths.final_video,
            root.join("03_Final").join("Demo_final.mp4")
        );
        assert_eq!(
            project.paths.normalized_video,
            root.join("02_Work").join("normalized.mp4")
        );
    }

    #[test]
    fn test_discover_does_not_create_directories() {
        let dir = tempfile::tempdir().unwrap();
        let root = complete_project(dir.path(), "Demo");

        let project = Project::discover(&root, &LayoutConfig::default()).unwrap();
        assert!(!project.paths.work_dir.exists());
        assert!(!project.paths.final_dir.exists());

        project.paths.ensure_dirs().unwrap();
        assert!(project.paths.work_dir.is_dir());
        assert!(project.paths.final_dir.is_dir());
    }

    #[test]
    fn test_missing_main_video_is_discovery_error() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("Empty");
        std::fs::create_dir_all(&root).unwrap();
        touch(&root.join("intro.png"));
        touch(&root.join("outro.png"));

        let err = Project::discover(&root, &LayoutConfig::default()).unwrap_err();
        match err {
            ReelbatchError::Discovery { project, message } => {
                assert_eq!(project, "Empty");
                assert!(message.contains("main video"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_missing_outro_is_discovery_error() {
        let dir = tempfile::tempdir().unwrap();
        let root = complete_project(dir.path(), "NoOutro");
        std::fs::remove_file(root.join("outro.png")).unwrap();

        let err = Project::discover(&root, &LayoutConfig::default()).unwrap_err();
        assert!(matches!(err, ReelbatchError::Discovery { .. }));
        assert!(err.to_string().contains("outro.png"));
        assert!(!err.to_string().contains("intro.png"));
    }

    #[test]
    fn test_main_video_first_in_lexical_order() {
        let dir = tempfile::tempdir().unwrap();
        let root = complete_project(dir.path(), "Multi");
        touch(&root.join("a_take.MP4"));
        touch(&root.join("notes.txt"));

        let project = Project::discover(&root, &LayoutConfig::default()).unwrap();
        assert_eq!(project.main_video, root.join("a_take.MP4"));
    }

    #[test]
    fn test_outputs_in_subfolders_are_not_candidates() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("Rerun");
        std::fs::create_dir_all(root.join("02_Work")).unwrap();
        touch(&root.join("02_Work").join("normalized.mp4"));
        touch(&root.join("intro.png"));
        touch(&root.join("outro.png"));

        assert!(Project::discover(&root, &LayoutConfig::default()).is_err());
    }

    #[test]
    fn test_list_project_dirs_sorted_and_dirs_only() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("b")).unwrap();
        std::fs::create_dir_all(dir.path().join("a")).unwrap();
        touch(&dir.path().join("readme.txt"));

        let dirs = list_project_dirs(dir.path()).unwrap();
        assert_eq!(dirs, vec![dir.path().join("a"), dir.path().join("b")]);
    }

    #[test]
    fn test_missing_batch_dir_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let err = list_project_dirs(&dir.path().join("VID")).unwrap_err();
        assert!(err.is_fatal());
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn test_final_name_keeps_non_utf8_directory_bytes() {
        use std::os::unix::ffi::OsStrExt;

        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join(OsStr::from_bytes(b"Caf\xe9"));
        std::fs::create_dir_all(&root).unwrap();
        touch(&root.join("main.mp4"));
        touch(&root.join("intro.png"));
        touch(&root.join("outro.png"));

        let project = Project::discover(&root, &LayoutConfig::default()).unwrap();
        assert_eq!(project.name, "Caf\u{FFFD}");
        assert_eq!(
            project.paths.final_video.file_name().unwrap().as_bytes(),
            b"Caf\xe9_final.mp4"
        );
        assert!(project.main_video.exists());
    }
}
