//! Page store: owns the backing file and an in-memory cache of page
//! buffers. Pages are loaded on demand, mutated in place through the cache,
//! and persisted only when flushed (normally at table close). Allocation is
//! append-only; freed pages are never reclaimed.

use std::{
    collections::HashMap,
    fs::{File, OpenOptions},
    io::{Read, Seek, SeekFrom, Write},
    path::Path,
};

use log::{debug, info};

use crate::{
    storage::node::PageBuffer,
    types::{
        DEFAULT_MAX_PAGES, PAGE_SIZE, PageNumber,
        error::{DatabaseError, Result},
    },
};

pub struct Pager {
    file: File,
    /// Pages present in the file at open time; pages past this extent are
    /// implicitly all-zero until flushed.
    pages_on_file: u32,
    /// Highest page index ever touched, plus one.
    num_pages: u32,
    max_pages: u32,
    cache: HashMap<PageNumber, Box<PageBuffer>>,
}

impl Pager {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::open_with_limit(path, DEFAULT_MAX_PAGES)
    }

    pub fn open_with_limit<P: AsRef<Path>>(path: P, max_pages: u32) -> Result<Self> {
        let path = path.as_ref();
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(path)?;
        let file_length = file.metadata()?.len();
        if file_length % PAGE_SIZE as u64 != 0 {
            return Err(DatabaseError::CorruptedFile {
                reason: format!(
                    "{} is not a whole number of pages ({} bytes)",
                    path.display(),
                    file_length
                ),
            });
        }
        let pages_on_file = (file_length / PAGE_SIZE as u64) as u32;
        info!(
            "opened {} ({} pages on file, limit {})",
            path.display(),
            pages_on_file,
            max_pages
        );
        Ok(Self {
            file,
            pages_on_file,
            num_pages: pages_on_file,
            max_pages,
            cache: HashMap::new(),
        })
    }

    /// Pages touched so far; also the page number the next allocation
    /// returns.
    pub fn num_pages(&self) -> u32 {
        self.num_pages
    }

    /// Append-only allocator: hands out the page number one past the highest
    /// ever touched. There is no free list, so space is never reclaimed.
    pub fn unused_page_num(&self) -> Result<PageNumber> {
        if self.num_pages >= self.max_pages {
            return Err(DatabaseError::TableFull);
        }
        Ok(self.num_pages)
    }

    /// Checks that `additional` more pages fit under the limit without
    /// handing any out. Multi-page operations call this before their first
    /// write so exhaustion cannot surface mid-mutation.
    pub fn reserve(&self, additional: u32) -> Result<()> {
        if self.num_pages + additional > self.max_pages {
            return Err(DatabaseError::TableFull);
        }
        Ok(())
    }

    fn ensure_cached(&mut self, page_num: PageNumber) -> Result<()> {
        if page_num >= self.max_pages {
            return Err(DatabaseError::PageNumberOutOfBounds {
                page: page_num,
                max: self.max_pages,
            });
        }
        if self.cache.contains_key(&page_num) {
            return Ok(());
        }
        // Cache miss: a page within the file extent is read from disk; one
        // past it is implicitly all-zero and becomes real when flushed.
        let mut buffer: Box<PageBuffer> = Box::new([0u8; PAGE_SIZE]);
        if page_num < self.pages_on_file {
            self.file
                .seek(SeekFrom::Start(page_num as u64 * PAGE_SIZE as u64))?;
            self.file.read_exact(buffer.as_mut_slice())?;
            debug!("page {page_num} loaded from disk");
        } else {
            debug!("page {page_num} initialized zero-filled");
        }
        self.cache.insert(page_num, buffer);
        if page_num >= self.num_pages {
            self.num_pages = page_num + 1;
        }
        Ok(())
    }

    pub fn page(&mut self, page_num: PageNumber) -> Result<&PageBuffer> {
        self.ensure_cached(page_num)?;
        Ok(self.cache.get(&page_num).expect("page just cached"))
    }

    pub fn page_mut(&mut self, page_num: PageNumber) -> Result<&mut PageBuffer> {
        self.ensure_cached(page_num)?;
        Ok(self.cache.get_mut(&page_num).expect("page just cached"))
    }

    /// Writes the full buffer for `page_num` to its file offset. Flushing a
    /// page that was never loaded is a programmer error.
    pub fn flush(&mut self, page_num: PageNumber) -> Result<()> {
        let buffer = self
            .cache
            .get(&page_num)
            .ok_or(DatabaseError::PageNeverLoaded { page: page_num })?;
        self.file
            .seek(SeekFrom::Start(page_num as u64 * PAGE_SIZE as u64))?;
        self.file.write_all(buffer.as_slice())?;
        if page_num >= self.pages_on_file {
            self.pages_on_file = page_num + 1;
        }
        Ok(())
    }

    /// Flushes every cached page and syncs the file.
    pub fn flush_all(&mut self) -> Result<()> {
        let mut cached: Vec<PageNumber> = self.cache.keys().copied().collect();
        cached.sort_unstable();
        for page_num in cached {
            self.flush(page_num)?;
        }
        self.file.flush()?;
        debug!("flushed {} cached pages", self.cache.len());
        Ok(())
    }
}
