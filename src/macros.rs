/// Helper macro for reading locked items, propagating a poisoned lock as
/// [`crate::Error::LockError`]
///
/// ```rust, ignore
///  let records = read_lock!(self.records);
///  println!("{}", records.len());
/// ```
macro_rules! read_lock {
    ($rwlock:expr) => {
        $rwlock.read().map_err(|_| crate::Error::LockError)?
    };
}

/// Helper macro for writing to locked items, propagating a poisoned lock as
/// [`crate::Error::LockError`]
///
/// ```rust, ignore
///  let mut records = write_lock!(self.records);
///  records.insert(name, record);
/// ```
macro_rules! write_lock {
    ($rwlock:expr) => {
        $rwlock.write().map_err(|_| crate::Error::LockError)?
    };
}
