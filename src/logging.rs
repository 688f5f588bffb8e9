//! Internal logging helpers for structured part-selection events.

/// Single logging target for the crate.
pub(crate) const LOG_TARGET: &str = "compaction_parts";

/// Fields attached to every event emitted while collecting for one table.
#[derive(Clone, Debug)]
pub(crate) struct LogContext {
    table_kv: String,
}

impl LogContext {
    pub(crate) fn for_table(table: &str) -> Self {
        Self {
            table_kv: format!("table={table}"),
        }
    }

    pub(crate) fn table_kv(&self) -> &str {
        &self.table_kv
    }
}

/// Emit `event=<name> table=<table> <fields>` on [`LOG_TARGET`].
macro_rules! parts_log {
    ($level:expr, ctx: $ctx:expr, $event:expr, $fmt:expr $(, $args:expr)* $(,)?) => {{
        if log::log_enabled!(target: crate::logging::LOG_TARGET, $level) {
            log::log!(
                target: crate::logging::LOG_TARGET,
                $level,
                "event={} {} {}",
                $event,
                $ctx.table_kv(),
                format_args!($fmt $(, $args)*)
            );
        }
    }};
}

pub(crate) use parts_log;
