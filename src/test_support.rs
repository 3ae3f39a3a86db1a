use tokio::sync::Mutex as AsyncMutex;

/// Serializes tests that set or clear `MCT_*` / `MACHTIANI_*` variables.
/// Sync tests take it with `.blocking_lock()`.
pub static ENV_LOCK: AsyncMutex<()> = AsyncMutex::const_new(());
