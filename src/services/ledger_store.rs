//! 导入记录存储 - 业务能力层
//!
//! 负责导入记录（ledger）的加载与"每次成功立即落盘"。
//!
//! 落盘协议：同目录临时文件 → 写入 → fsync → 原子 rename → fsync 目录，
//! 读者永远看不到写了一半的文件。文件存储在整个运行期间持有 `<ledger>.lock`
//! 上的排他 flock，同一份记录不能被两个进程同时使用。

use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::error::LedgerError;
use crate::models::Ledger;

/// 加载时记录文件的状态
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LedgerLoad {
    /// 文件不存在，从空记录开始
    Missing,
    /// 正常加载
    Loaded,
    /// 文件损坏，从空记录开始；原文件已另存为 `backup`
    Corrupt {
        reason: String,
        backup: Option<PathBuf>,
    },
}

/// 加载结果
#[derive(Debug, Clone)]
pub struct LoadedLedger {
    pub ledger: Ledger,
    pub status: LedgerLoad,
}

/// 导入记录存储
///
/// 职责：
/// - 加载记录（缺失或损坏时返回空记录，不报错）
/// - 同步持久化完整记录
/// - 不提供删除操作
pub trait LedgerStore: Send {
    /// 加载记录
    fn load(&mut self) -> Result<LoadedLedger, LedgerError>;

    /// 持久化完整记录
    fn persist(&mut self, ledger: &Ledger) -> Result<(), LedgerError>;

    /// 记录一次成功导入并立即落盘
    ///
    /// 落盘失败时撤销内存中的插入并返回错误：无法确认的成功按"未导入"处理。
    /// 返回值表示是否为新增条目。
    fn record_success(
        &mut self,
        ledger: &mut Ledger,
        destination: &str,
        item_id: &str,
    ) -> Result<bool, LedgerError> {
        if !ledger.insert(destination, item_id) {
            return Ok(false);
        }
        if let Err(e) = self.persist(ledger) {
            ledger.forget_unconfirmed(destination, item_id);
            return Err(e);
        }
        Ok(true)
    }
}

/// 基于 JSON 文件的导入记录存储
pub struct JsonFileLedgerStore {
    path: PathBuf,
    _lock: File,
}

impl JsonFileLedgerStore {
    /// 打开记录文件并获取排他锁
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, LedgerError> {
        let path = path.into();
        let dir = parent_dir(&path);
        fs::create_dir_all(dir).map_err(|source| LedgerError::ReadFailed {
            path: path.clone(),
            source,
        })?;

        let lock_path = lock_path_for(&path);
        let lock = OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(&lock_path)
            .map_err(|source| LedgerError::ReadFailed {
                path: lock_path.clone(),
                source,
            })?;

        let acquired = try_lock_exclusive(&lock).map_err(|source| LedgerError::ReadFailed {
            path: lock_path.clone(),
            source,
        })?;
        if !acquired {
            return Err(LedgerError::Locked { path });
        }

        debug!("已锁定导入记录: {}", path.display());
        Ok(Self { path, _lock: lock })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// 损坏的文件另存一份，避免第一次落盘时被覆盖
    fn back_up_corrupt(&self) -> Option<PathBuf> {
        let file_name = self.path.file_name()?.to_string_lossy().to_string();
        let stamp = chrono::Local::now().format("%Y%m%d-%H%M%S");
        let backup = self
            .path
            .with_file_name(format!("{}.corrupt-{}", file_name, stamp));
        fs::copy(&self.path, &backup).ok()?;
        Some(backup)
    }
}

impl LedgerStore for JsonFileLedgerStore {
    fn load(&mut self) -> Result<LoadedLedger, LedgerError> {
        let content = match fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                return Ok(LoadedLedger {
                    ledger: Ledger::new(),
                    status: LedgerLoad::Missing,
                });
            }
            Err(e) if e.kind() == io::ErrorKind::InvalidData => {
                // 非 UTF-8 内容同样视为损坏
                return Ok(LoadedLedger {
                    ledger: Ledger::new(),
                    status: LedgerLoad::Corrupt {
                        reason: e.to_string(),
                        backup: self.back_up_corrupt(),
                    },
                });
            }
            Err(source) => {
                return Err(LedgerError::ReadFailed {
                    path: self.path.clone(),
                    source,
                });
            }
        };

        match serde_json::from_str::<Ledger>(&content) {
            Ok(ledger) => Ok(LoadedLedger {
                ledger,
                status: LedgerLoad::Loaded,
            }),
            Err(e) => Ok(LoadedLedger {
                ledger: Ledger::new(),
                status: LedgerLoad::Corrupt {
                    reason: e.to_string(),
                    backup: self.back_up_corrupt(),
                },
            }),
        }
    }

    fn persist(&mut self, ledger: &Ledger) -> Result<(), LedgerError> {
        let json = serde_json::to_string_pretty(ledger)?;
        atomic_write(&self.path, json.as_bytes()).map_err(|source| LedgerError::PersistFailed {
            path: self.path.clone(),
            source,
        })?;
        debug!("导入记录已落盘: {} 条", ledger.len());
        Ok(())
    }
}

/// 内存中的导入记录存储（测试与演练用）
#[derive(Debug, Default)]
pub struct InMemoryLedgerStore {
    persisted: Option<Ledger>,
    persist_count: usize,
    fail_persist: bool,
}

impl InMemoryLedgerStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// 以已有记录开始
    pub fn with_ledger(ledger: Ledger) -> Self {
        Self {
            persisted: Some(ledger),
            ..Self::default()
        }
    }

    /// 之后的每次持久化都失败
    pub fn fail_persists(&mut self, fail: bool) {
        self.fail_persist = fail;
    }

    /// 最近一次成功持久化的记录
    pub fn persisted(&self) -> Option<&Ledger> {
        self.persisted.as_ref()
    }

    pub fn persist_count(&self) -> usize {
        self.persist_count
    }
}

impl LedgerStore for InMemoryLedgerStore {
    fn load(&mut self) -> Result<LoadedLedger, LedgerError> {
        Ok(match &self.persisted {
            Some(ledger) => LoadedLedger {
                ledger: ledger.clone(),
                status: LedgerLoad::Loaded,
            },
            None => LoadedLedger {
                ledger: Ledger::new(),
                status: LedgerLoad::Missing,
            },
        })
    }

    fn persist(&mut self, ledger: &Ledger) -> Result<(), LedgerError> {
        if self.fail_persist {
            return Err(LedgerError::PersistFailed {
                path: PathBuf::from("<memory>"),
                source: io::Error::new(io::ErrorKind::Other, "模拟写入失败"),
            });
        }
        self.persisted = Some(ledger.clone());
        self.persist_count += 1;
        Ok(())
    }
}

// ========== 文件辅助函数 ==========

fn parent_dir(path: &Path) -> &Path {
    match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    }
}

fn lock_path_for(path: &Path) -> PathBuf {
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| "ledger".to_string());
    path.with_file_name(format!("{}.lock", file_name))
}

/// 临时文件 + fsync + rename 的原子写入
fn atomic_write(path: &Path, data: &[u8]) -> io::Result<()> {
    let dir = parent_dir(path);
    let mut tmp = tempfile::NamedTempFile::new_in(dir)?;
    tmp.write_all(data)?;
    tmp.flush()?;
    tmp.as_file().sync_all()?;
    tmp.persist(path).map_err(|e| e.error)?;
    fsync_directory(dir)
}

#[cfg(unix)]
fn fsync_directory(dir: &Path) -> io::Result<()> {
    File::open(dir)?.sync_all()
}

#[cfg(not(unix))]
fn fsync_directory(_: &Path) -> io::Result<()> {
    Ok(())
}

#[cfg(unix)]
#[allow(unsafe_code)]
fn try_lock_exclusive(file: &File) -> io::Result<bool> {
    use std::os::unix::io::AsRawFd;

    let fd = file.as_raw_fd();
    // SAFETY: `fd` 来自仍然存活的 `File`，`LOCK_EX | LOCK_NB` 是合法的 flock 操作。
    let rc = unsafe { libc::flock(fd, libc::LOCK_EX | libc::LOCK_NB) };
    if rc == 0 {
        return Ok(true);
    }
    let err = io::Error::last_os_error();
    if err.kind() == io::ErrorKind::WouldBlock || err.raw_os_error() == Some(libc::EWOULDBLOCK) {
        return Ok(false);
    }
    Err(err)
}

#[cfg(not(unix))]
fn try_lock_exclusive(_: &File) -> io::Result<bool> {
    Ok(true)
}
