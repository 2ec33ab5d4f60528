// JSON-lines file store: one record per line, rewritten atomically under an fs2 lock.
use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use fs2::FileExt;
use time::OffsetDateTime;

use crate::core::error::{Error, ErrorKind};
use crate::core::object_id::ObjectId;
use crate::core::record::{Record, RecordUpdate};
use crate::core::store::{Clock, Store, remove_record, update_record};

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
enum LockMode {
    Shared,
    Exclusive,
}

#[derive(Debug)]
pub struct FileStore {
    path: PathBuf,
    lock_path: PathBuf,
    clock: Clock,
}

impl FileStore {
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, Error> {
        Self::open_with_clock(path, OffsetDateTime::now_utc)
    }

    pub fn open_with_clock(path: impl Into<PathBuf>, clock: Clock) -> Result<Self, Error> {
        let path = path.into();
        if path.as_os_str().is_empty() {
            return Err(Error::new(ErrorKind::Usage).with_message("store path is empty"));
        }
        if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|err| {
                Error::new(map_io_error_kind(&err))
                    .with_message("failed to create store directory")
                    .with_path(parent)
                    .with_source(err)
            })?;
        }
        let lock_path = sibling_with_suffix(&path, "lock");
        let store = Self {
            path,
            lock_path,
            clock,
        };
        // Surface unreadable or corrupt files at startup rather than on first request.
        store.with_lock(LockMode::Shared, || store.load())?;
        Ok(store)
    }

    fn with_lock<T>(
        &self,
        mode: LockMode,
        f: impl FnOnce() -> Result<T, Error>,
    ) -> Result<T, Error> {
        let file = OpenOptions::new()
            .create(true)
            .truncate(false)
            .read(true)
            .write(true)
            .open(&self.lock_path)
            .map_err(|err| {
                Error::new(map_io_error_kind(&err))
                    .with_message("failed to open store lock")
                    .with_path(&self.lock_path)
                    .with_source(err)
            })?;
        let locked = match mode {
            LockMode::Shared => FileExt::lock_shared(&file),
            LockMode::Exclusive => FileExt::lock_exclusive(&file),
        };
        locked.map_err(|err| {
            Error::new(ErrorKind::Busy)
                .with_message("failed to lock store")
                .with_path(&self.lock_path)
                .with_source(err)
        })?;
        let result = f();
        let _ = FileExt::unlock(&file);
        result
    }

    fn load(&self) -> Result<Vec<Record>, Error> {
        let contents = match fs::read_to_string(&self.path) {
            Ok(contents) => contents,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(err) => {
                return Err(Error::new(map_io_error_kind(&err))
                    .with_message("failed to read store")
                    .with_path(&self.path)
                    .with_source(err));
            }
        };
        let mut records = Vec::new();
        for (idx, line) in contents.lines().enumerate() {
            if line.trim().is_empty() {
                continue;
            }
            let record: Record = serde_json::from_str(line).map_err(|err| {
                Error::new(ErrorKind::Corrupt)
                    .with_message(format!("invalid record on line {}", idx + 1))
                    .with_path(&self.path)
                    .with_source(err)
            })?;
            records.push(record);
        }
        Ok(records)
    }

    fn save(&self, records: &[Record]) -> Result<(), Error> {
        let mut buf = Vec::new();
        for record in records {
            serde_json::to_writer(&mut buf, record).map_err(|err| {
                Error::new(ErrorKind::Internal)
                    .with_message("failed to encode record")
                    .with_source(err)
            })?;
            buf.push(b'\n');
        }

        let tmp_path = sibling_with_suffix(&self.path, "tmp");
        let write = || -> io::Result<()> {
            let mut file = File::create(&tmp_path)?;
            file.write_all(&buf)?;
            file.sync_all()?;
            fs::rename(&tmp_path, &self.path)
        };
        write().map_err(|err| {
            let _ = fs::remove_file(&tmp_path);
            Error::new(map_io_error_kind(&err))
                .with_message("failed to write store")
                .with_path(&self.path)
                .with_source(err)
        })
    }
}

impl Store for FileStore {
    fn insert(&self, message: String) -> Result<Record, Error> {
        let record = Record::create(message, (self.clock)())?;
        self.with_lock(LockMode::Exclusive, || {
            let mut records = self.load()?;
            records.push(record.clone());
            self.save(&records)
        })?;
        Ok(record)
    }

    fn find_all(&self) -> Result<Vec<Record>, Error> {
        self.with_lock(LockMode::Shared, || self.load())
    }

    fn delete_by_id(&self, id: &ObjectId) -> Result<Option<Record>, Error> {
        self.with_lock(LockMode::Exclusive, || {
            let mut records = self.load()?;
            let removed = remove_record(&mut records, id);
            if removed.is_some() {
                self.save(&records)?;
            }
            Ok(removed)
        })
    }

    fn update_by_id(
        &self,
        id: &ObjectId,
        update: &RecordUpdate,
    ) -> Result<Option<Record>, Error> {
        let now = (self.clock)();
        self.with_lock(LockMode::Exclusive, || {
            let mut records = self.load()?;
            let updated = update_record(&mut records, id, update, now);
            if updated.is_some() && !update.is_empty() {
                self.save(&records)?;
            }
            Ok(updated)
        })
    }

    fn describe(&self) -> String {
        format!("file:{}", self.path.display())
    }
}

fn sibling_with_suffix(path: &Path, suffix: &str) -> PathBuf {
    let mut name = path.file_name().map(|name| name.to_os_string()).unwrap_or_default();
    name.push(".");
    name.push(suffix);
    path.with_file_name(name)
}

fn map_io_error_kind(err: &io::Error) -> ErrorKind {
    match err.kind() {
        io::ErrorKind::WouldBlock => ErrorKind::Busy,
        _ => ErrorKind::Store,
    }
}
