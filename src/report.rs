//! Result sinks: where completed replicates go.
//!
//! A sink is shared by every worker of a batch, so it must be `Send + Sync`. [`CsvSaver`] gives
//! each replicate its own set of files, derived from a destination pattern with a numeric
//! placeholder, so concurrent saves never touch the same file. [`MemorySaver`] keeps the outputs
//! behind a mutex.

use std::collections::BTreeMap;
use std::ffi::OsStr;
use std::fs::{self, create_dir_all, File};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Mutex;

use csv::Writer;
use log::{debug, trace};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, EnumString, IntoEnumIterator};

use crate::database::ReplicateOutput;
use crate::error::SimError;

pub trait ResultSink: Send + Sync {
    /// Removes artifacts left by an earlier batch. Called once before any replicate starts.
    ///
    /// # Errors
    ///
    /// Returns an error if the destination cannot be prepared.
    fn clear_stale(&self) -> Result<(), SimError> {
        Ok(())
    }

    /// Stores the output of one successfully completed replicate.
    ///
    /// # Errors
    ///
    /// Returns an error if the output cannot be written.
    fn save(&self, replicate: usize, run: &ReplicateOutput) -> Result<(), SimError>;
}

/// The tables a [`CsvSaver`] can write for each replicate.
#[derive(
    Copy,
    Clone,
    Debug,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    EnumIter,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum SaveWhat {
    TotalHist,
    Transition,
    Transmission,
    Reproductive,
    Generation,
}

/// A destination such as `output/run-{:03}`: a directory and a file stem with one numeric
/// placeholder, `{}` or `{:0N}` for a zero-padded width of `N`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DestinationPattern {
    dir: PathBuf,
    prefix: String,
    width: usize,
    suffix: String,
}

impl FromStr for DestinationPattern {
    type Err = SimError;

    fn from_str(pattern: &str) -> Result<Self, SimError> {
        let path = Path::new(pattern);
        let file_name = path.file_name().and_then(OsStr::to_str).ok_or_else(|| {
            SimError::config(format!("destination pattern {pattern:?} has no file name"))
        })?;
        let dir = path.parent().map_or_else(PathBuf::new, Path::to_path_buf);

        let start = file_name.find('{').ok_or_else(|| {
            SimError::config(format!(
                "destination pattern {pattern:?} must contain a placeholder such as {{}} or {{:05}}"
            ))
        })?;
        let end = start
            + file_name[start..].find('}').ok_or_else(|| {
                SimError::config(format!(
                    "destination pattern {pattern:?} has an unclosed placeholder"
                ))
            })?;
        let spec = &file_name[start + 1..end];
        let width = match spec {
            "" => 0,
            _ => spec
                .strip_prefix(":0")
                .and_then(|digits| digits.parse::<usize>().ok())
                .ok_or_else(|| {
                    SimError::config(format!(
                        "unsupported placeholder {{{spec}}} in destination pattern {pattern:?}"
                    ))
                })?,
        };

        let prefix = &file_name[..start];
        let suffix = &file_name[end + 1..];
        if suffix.contains(['{', '}']) || prefix.contains('}') {
            return Err(SimError::config(format!(
                "destination pattern {pattern:?} must contain exactly one placeholder"
            )));
        }

        Ok(DestinationPattern {
            dir,
            prefix: prefix.to_string(),
            width,
            suffix: suffix.to_string(),
        })
    }
}

impl DestinationPattern {
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// The file stem of `replicate`, e.g. `run-007`.
    pub fn stem(&self, replicate: usize) -> String {
        format!(
            "{}{:0width$}{}",
            self.prefix,
            replicate,
            self.suffix,
            width = self.width
        )
    }

    /// Path of the `what` table of `replicate`: `<dir>/<stem>-<what>.csv`.
    pub fn path(&self, replicate: usize, what: SaveWhat) -> PathBuf {
        self.dir.join(format!("{}-{what}.csv", self.stem(replicate)))
    }

    /// Whether `file_name` could have been produced by this pattern, for any replicate and table,
    /// including the temporary files of an interrupted save.
    pub fn matches(&self, file_name: &str) -> bool {
        let Some(rest) = file_name
            .strip_prefix(self.prefix.as_str())
            .and_then(|rest| {
                rest.strip_suffix(".csv")
                    .or_else(|| rest.strip_suffix(TEMP_SUFFIX))
            })
        else {
            return false;
        };
        SaveWhat::iter().any(|what| {
            rest.strip_suffix(&format!("{}-{what}", self.suffix))
                .is_some_and(|digits| {
                    !digits.is_empty() && digits.bytes().all(|byte| byte.is_ascii_digit())
                })
        })
    }
}

const TEMP_SUFFIX: &str = ".csv.tmp";

// Temporary sibling of a table, renamed into place once every table of the replicate is written.
fn temp_path(path: &Path) -> PathBuf {
    path.with_extension("csv.tmp")
}

fn remove_quietly(path: &Path) {
    if let Err(error) = fs::remove_file(path) {
        debug!("could not remove {}: {error}", path.display());
    }
}

// Creates the file and all parent directories if they do not exist.
fn create_csv_writer(path: &Path) -> Result<Writer<File>, SimError> {
    if let Some(parent) = path.parent() {
        create_dir_all(parent)?;
    }
    let file = File::create(path)?;
    Ok(Writer::from_writer(file))
}

fn write_rows<T: Serialize>(
    path: &Path,
    rows: impl IntoIterator<Item = T>,
) -> Result<(), SimError> {
    let mut writer = create_csv_writer(path)?;
    for row in rows {
        writer.serialize(row)?;
    }
    writer.flush()?;
    Ok(())
}

/// Writes the selected tables of every replicate to CSV files named after a
/// [`DestinationPattern`].
#[derive(Clone, Debug)]
pub struct CsvSaver {
    pattern: DestinationPattern,
    what: Vec<SaveWhat>,
}

impl CsvSaver {
    /// A saver writing every table.
    ///
    /// # Errors
    ///
    /// Returns a [`SimError::ConfigError`] if `pattern` is not a valid destination pattern.
    pub fn new(pattern: &str) -> Result<Self, SimError> {
        Self::with_tables(pattern, SaveWhat::iter())
    }

    /// A saver writing only the given tables.
    ///
    /// # Errors
    ///
    /// Returns a [`SimError::ConfigError`] if `pattern` is not a valid destination pattern.
    pub fn with_tables(
        pattern: &str,
        what: impl IntoIterator<Item = SaveWhat>,
    ) -> Result<Self, SimError> {
        let mut what: Vec<SaveWhat> = what.into_iter().collect();
        what.sort_unstable();
        what.dedup();
        Ok(CsvSaver {
            pattern: pattern.parse()?,
            what,
        })
    }

    pub fn pattern(&self) -> &DestinationPattern {
        &self.pattern
    }

    pub fn tables(&self) -> &[SaveWhat] {
        &self.what
    }

    // Writes the temporary files, recording each one in `staged` as soon as it is created.
    fn stage(
        &self,
        replicate: usize,
        run: &ReplicateOutput,
        staged: &mut Vec<(PathBuf, PathBuf)>,
    ) -> Result<(), SimError> {
        for &what in &self.what {
            let path = self.pattern.path(replicate, what);
            let temp = temp_path(&path);
            staged.push((temp.clone(), path));
            let database = &run.database;
            match what {
                SaveWhat::TotalHist => write_rows(&temp, database.total_hist())?,
                SaveWhat::Transition => write_rows(&temp, database.transitions())?,
                SaveWhat::Transmission => write_rows(&temp, database.transmissions())?,
                SaveWhat::Reproductive => write_rows(&temp, database.reproductive_number())?,
                SaveWhat::Generation => write_rows(&temp, database.generation_time())?,
            }
        }
        Ok(())
    }
}

impl ResultSink for CsvSaver {
    /// Creates the destination directory and deletes every file in it that the pattern could have
    /// produced.
    fn clear_stale(&self) -> Result<(), SimError> {
        let dir = self.pattern.dir();
        let dir = if dir.as_os_str().is_empty() {
            Path::new(".")
        } else {
            dir
        };
        create_dir_all(dir)?;

        let mut removed = 0;
        for entry in fs::read_dir(dir)? {
            let entry = entry?;
            let name = entry.file_name();
            let Some(name) = name.to_str() else {
                continue;
            };
            if self.pattern.matches(name) && entry.file_type()?.is_file() {
                trace!("removing stale output {name}");
                fs::remove_file(entry.path())?;
                removed += 1;
            }
        }
        debug!("removed {removed} stale files from {}", dir.display());
        Ok(())
    }

    /// Writes every table to a temporary file first and renames them into place only once all of
    /// them are written. On failure nothing of this replicate is left behind.
    fn save(&self, replicate: usize, run: &ReplicateOutput) -> Result<(), SimError> {
        let mut staged: Vec<(PathBuf, PathBuf)> = Vec::with_capacity(self.what.len());
        if let Err(error) = self.stage(replicate, run, &mut staged) {
            for (temp, _) in &staged {
                remove_quietly(temp);
            }
            return Err(error);
        }

        for (position, (temp, path)) in staged.iter().enumerate() {
            if let Err(error) = fs::rename(temp, path) {
                for (_, published) in &staged[..position] {
                    remove_quietly(published);
                }
                for (temp, _) in &staged[position..] {
                    remove_quietly(temp);
                }
                return Err(error.into());
            }
            trace!("replicate {replicate}: wrote {}", path.display());
        }
        Ok(())
    }
}

/// Keeps replicate outputs in memory, keyed by replicate index.
#[derive(Debug, Default)]
pub struct MemorySaver {
    outputs: Mutex<BTreeMap<usize, ReplicateOutput>>,
}

impl MemorySaver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored replicates.
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    pub fn get(&self, replicate: usize) -> Option<ReplicateOutput> {
        self.lock().get(&replicate).cloned()
    }

    pub fn into_outputs(self) -> BTreeMap<usize, ReplicateOutput> {
        self.outputs
            .into_inner()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, BTreeMap<usize, ReplicateOutput>> {
        // A panicking writer cannot leave a half-inserted entry behind.
        self.outputs
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}

impl ResultSink for MemorySaver {
    fn clear_stale(&self) -> Result<(), SimError> {
        self.lock().clear();
        Ok(())
    }

    fn save(&self, replicate: usize, run: &ReplicateOutput) -> Result<(), SimError> {
        self.lock().insert(replicate, run.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::thread;

    use tempfile::tempdir;

    use super::*;
    use crate::database::{Database, GenerationRow, TotalHistRow, TransmissionRow};
    use crate::population::{AgentId, HealthState};
    use crate::virus::{Virus, VirusId};

    fn output(replicate: usize) -> ReplicateOutput {
        let mut database = Database::default();
        let mut transitions = [[0; 4]; 4];
        transitions[0][0] = 9;
        transitions[1][1] = 1;
        database.record_day([9, 1, 0, 0], transitions);
        transitions = [[0; 4]; 4];
        transitions[0][0] = 8;
        transitions[0][1] = 1;
        transitions[1][2] = 1;
        database.record_day([8, 1, 1, 0], transitions);
        let virus = Virus::new(VirusId(0), "flu");
        database.record_seed(AgentId(3), &virus);
        database.record_transmission(1, AgentId(3), AgentId(replicate), &virus);
        ReplicateOutput {
            replicate,
            seed: 100 + replicate as u64,
            days: 1,
            database,
        }
    }

    #[test]
    fn pattern_formats_replicate_index() {
        let pattern: DestinationPattern = "out/run-{:03}".parse().unwrap();
        assert_eq!(pattern.stem(7), "run-007");
        assert_eq!(pattern.stem(1234), "run-1234");
        assert_eq!(
            pattern.path(7, SaveWhat::TotalHist),
            Path::new("out").join("run-007-total_hist.csv")
        );

        let pattern: DestinationPattern = "{}-episimulation".parse().unwrap();
        assert_eq!(pattern.stem(12), "12-episimulation");
        assert_eq!(
            pattern.path(3, SaveWhat::Transmission),
            PathBuf::from("3-episimulation-transmission.csv")
        );
    }

    #[test]
    fn pattern_rejects_bad_placeholders() {
        for bad in ["out/run", "out/run-{", "out/run-{:x}", "out/{}-{}", "out/{:5}"] {
            let error = bad.parse::<DestinationPattern>().unwrap_err();
            assert!(matches!(error, SimError::ConfigError(_)), "{bad}: {error}");
        }
    }

    #[test]
    fn pattern_matches_its_own_files_only() {
        let pattern: DestinationPattern = "run-{:03}".parse().unwrap();
        assert!(pattern.matches("run-000-total_hist.csv"));
        assert!(pattern.matches("run-12345-transition.csv"));
        assert!(!pattern.matches("run--total_hist.csv"));
        assert!(!pattern.matches("run-001-virus_hist.csv"));
        assert!(!pattern.matches("run-0a1-transition.csv"));
        assert!(!pattern.matches("other-001-transition.csv"));
        assert!(pattern.matches("run-004-generation.csv"));
        assert!(pattern.matches("run-004-reproductive.csv.tmp"));
        assert!(!pattern.matches("run-004-reproductive.tmp"));
    }

    #[test]
    fn writes_selected_tables() {
        let temp_dir = tempdir().unwrap();
        let pattern = temp_dir.path().join("nested").join("sim-{:02}");
        let saver = CsvSaver::with_tables(
            pattern.to_str().unwrap(),
            [SaveWhat::TotalHist, SaveWhat::Transmission],
        )
        .unwrap();
        saver.save(4, &output(4)).unwrap();

        let dir = temp_dir.path().join("nested");
        assert!(!dir.join("sim-04-transition.csv").exists());

        let mut reader = csv::Reader::from_path(dir.join("sim-04-total_hist.csv")).unwrap();
        let rows: Vec<TotalHistRow> = reader.deserialize().map(Result::unwrap).collect();
        assert_eq!(rows.len(), 8);
        assert_eq!(
            rows[6],
            TotalHistRow {
                date: 1,
                state: HealthState::Infected,
                counts: 1
            }
        );

        let mut reader = csv::Reader::from_path(dir.join("sim-04-transmission.csv")).unwrap();
        let rows: Vec<TransmissionRow> = reader.deserialize().map(Result::unwrap).collect();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].source, 3);
        assert_eq!(rows[0].target, 4);
    }

    #[test]
    fn transition_table_has_a_header() {
        let temp_dir = tempdir().unwrap();
        let pattern = temp_dir.path().join("r{}");
        let saver =
            CsvSaver::with_tables(pattern.to_str().unwrap(), [SaveWhat::Transition]).unwrap();
        saver.save(0, &output(0)).unwrap();

        let contents = fs::read_to_string(temp_dir.path().join("r0-transition.csv")).unwrap();
        let mut lines = contents.lines();
        assert_eq!(lines.next(), Some("date,from,to,counts"));
        assert_eq!(lines.next(), Some("1,Susceptible,Exposed,1"));
        assert_eq!(lines.next(), Some("1,Exposed,Infected,1"));
        assert_eq!(lines.next(), None);
    }

    #[test]
    fn writes_reproductive_and_generation_tables() {
        let temp_dir = tempdir().unwrap();
        let saver = CsvSaver::with_tables(
            temp_dir.path().join("r{}").to_str().unwrap(),
            [SaveWhat::Reproductive, SaveWhat::Generation],
        )
        .unwrap();
        saver.save(5, &output(5)).unwrap();

        let contents = fs::read_to_string(temp_dir.path().join("r5-reproductive.csv")).unwrap();
        let mut lines = contents.lines();
        assert_eq!(
            lines.next(),
            Some("virus_id,virus,source,source_exposure_date,rt")
        );
        assert_eq!(lines.next(), Some("0,flu,3,0,1"));
        assert_eq!(lines.next(), Some("0,flu,5,1,0"));
        assert_eq!(lines.next(), None);

        let mut reader = csv::Reader::from_path(temp_dir.path().join("r5-generation.csv")).unwrap();
        let rows: Vec<GenerationRow> = reader.deserialize().map(Result::unwrap).collect();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].source, 3);
        assert_eq!(rows[0].generation_time, 1);
    }

    #[test]
    fn failed_save_leaves_no_files_behind() {
        let temp_dir = tempdir().unwrap();
        let dir = temp_dir.path();
        let saver = CsvSaver::new(dir.join("run-{:02}").to_str().unwrap()).unwrap();
        // A directory where a table should go cannot be replaced by the table.
        fs::create_dir(dir.join("run-00-transition.csv")).unwrap();

        assert!(matches!(
            saver.save(0, &output(0)),
            Err(SimError::IoError(_))
        ));
        saver.save(1, &output(1)).unwrap();

        let mut names: Vec<String> = fs::read_dir(dir)
            .unwrap()
            .map(|entry| entry.unwrap())
            .filter(|entry| entry.file_type().unwrap().is_file())
            .map(|entry| entry.file_name().into_string().unwrap())
            .collect();
        names.sort();
        assert_eq!(
            names,
            vec![
                "run-01-generation.csv",
                "run-01-reproductive.csv",
                "run-01-total_hist.csv",
                "run-01-transition.csv",
                "run-01-transmission.csv",
            ]
        );
    }

    #[test]
    fn clear_stale_removes_only_pattern_files() {
        let temp_dir = tempdir().unwrap();
        let dir = temp_dir.path();
        for name in [
            "run-000-total_hist.csv",
            "run-017-transmission.csv",
            "run-003-generation.csv.tmp",
            "keep-000-total_hist.csv",
            "run-000-notes.txt",
        ] {
            fs::write(dir.join(name), "stale").unwrap();
        }

        let saver = CsvSaver::new(dir.join("run-{:03}").to_str().unwrap()).unwrap();
        saver.clear_stale().unwrap();

        assert!(!dir.join("run-000-total_hist.csv").exists());
        assert!(!dir.join("run-017-transmission.csv").exists());
        assert!(!dir.join("run-003-generation.csv.tmp").exists());
        assert!(dir.join("keep-000-total_hist.csv").exists());
        assert!(dir.join("run-000-notes.txt").exists());
    }

    #[test]
    fn clear_stale_creates_the_directory() {
        let temp_dir = tempdir().unwrap();
        let dir = temp_dir.path().join("fresh");
        let saver = CsvSaver::new(dir.join("{}").to_str().unwrap()).unwrap();
        saver.clear_stale().unwrap();
        assert!(dir.is_dir());
    }

    #[test]
    fn clear_stale_fails_on_unusable_directory() {
        let temp_dir = tempdir().unwrap();
        let blocker = temp_dir.path().join("blocker");
        fs::write(&blocker, "not a directory").unwrap();
        let saver = CsvSaver::new(blocker.join("{}").to_str().unwrap()).unwrap();
        assert!(matches!(saver.clear_stale(), Err(SimError::IoError(_))));
    }

    #[test]
    fn concurrent_saves_do_not_interleave() {
        let temp_dir = tempdir().unwrap();
        let saver = CsvSaver::new(temp_dir.path().join("{:02}").to_str().unwrap()).unwrap();
        let num_threads = 8;

        thread::scope(|scope| {
            for i in 0..num_threads {
                let saver = &saver;
                scope.spawn(move || saver.save(i, &output(i)).unwrap());
            }
        });

        for i in 0..num_threads {
            let path = saver.pattern().path(i, SaveWhat::Transmission);
            let mut reader = csv::Reader::from_path(path).expect("Failed to open CSV file");
            let rows: Vec<TransmissionRow> = reader.deserialize().map(Result::unwrap).collect();
            assert_eq!(rows.len(), 1);
            assert_eq!(rows[0].target, i);
        }
    }

    #[test]
    fn memory_saver_collects_outputs() {
        let saver = MemorySaver::new();
        thread::scope(|scope| {
            for i in 0..4 {
                let saver = &saver;
                scope.spawn(move || saver.save(i, &output(i)).unwrap());
            }
        });
        assert_eq!(saver.len(), 4);
        assert_eq!(saver.get(2).unwrap().seed, 102);

        saver.clear_stale().unwrap();
        assert!(saver.is_empty());
        saver.save(9, &output(9)).unwrap();
        let outputs = saver.into_outputs();
        assert_eq!(outputs.keys().copied().collect::<Vec<_>>(), vec![9]);
    }
}
