//! Fault-injecting backend shared by the integration tests.
#![allow(dead_code)]

use std::cell::{Cell, RefCell};
use std::fs::File;
use std::io;
use std::path::{Path, PathBuf};
use std::rc::Rc;

use mmap_edit::{Backend, Mapping, Mode, OpenHow, OsBackend, Stat};

/// Switches flipped by a test to make the next matching call fail.
#[derive(Default)]
pub struct Faults {
    pub open: RefCell<Vec<OpenHow>>,
    pub stat: Cell<bool>,
    pub set_len: Cell<bool>,
    pub map: Cell<bool>,
    pub remap: Cell<bool>,
    pub sync: Cell<bool>,
    /// Once a sync fails, fail every later remap too.
    pub remap_after_sync: Cell<bool>,
    pub remap_calls: Cell<u32>,
}

impl Faults {
    pub fn clear(&self) {
        self.open.borrow_mut().clear();
        self.stat.set(false);
        self.set_len.set(false);
        self.map.set(false);
        self.remap.set(false);
        self.sync.set(false);
        self.remap_after_sync.set(false);
    }
}

/// Real filesystem with switchable failures at every step.
#[derive(Clone, Default)]
pub struct FaultyBackend {
    pub faults: Rc<Faults>,
}

fn injected() -> io::Error {
    io::Error::from_raw_os_error(libc::EIO)
}

impl Backend for FaultyBackend {
    fn open(&self, path: &Path, how: OpenHow, mode: Mode) -> io::Result<File> {
        if self.faults.open.borrow().contains(&how) {
            return Err(injected());
        }
        OsBackend.open(path, how, mode)
    }

    fn stat(&self, file: &File) -> io::Result<Stat> {
        if self.faults.stat.get() {
            return Err(injected());
        }
        OsBackend.stat(file)
    }

    fn set_len(&self, file: &File, len: u64) -> io::Result<()> {
        if self.faults.set_len.get() {
            return Err(injected());
        }
        OsBackend.set_len(file, len)
    }

    fn map(&self, file: &File, len: u64, writable: bool) -> io::Result<Mapping> {
        if self.faults.map.get() {
            return Err(injected());
        }
        OsBackend.map(file, len, writable)
    }

    fn remap(&self, file: &File, map: &mut Mapping, new_len: u64) -> io::Result<()> {
        self.faults.remap_calls.set(self.faults.remap_calls.get() + 1);
        if self.faults.remap.get() {
            return Err(injected());
        }
        OsBackend.remap(file, map, new_len)
    }

    fn sync(&self, map: &Mapping) -> io::Result<()> {
        if self.faults.sync.get() {
            if self.faults.remap_after_sync.get() {
                self.faults.remap.set(true);
            }
            return Err(injected());
        }
        OsBackend.sync(map)
    }

    fn remove(&self, path: &Path) -> io::Result<()> {
        OsBackend.remove(path)
    }
}

pub fn tmp_path(dir: &tempfile::TempDir, name: &str) -> PathBuf {
    dir.path().join(name)
}

pub fn disk_len(path: &Path) -> u64 {
    std::fs::metadata(path).expect("metadata").len()
}
