//! Utility macros

/// Implement Debug for a type holding a `PgPool`, which has no Debug impl
/// worth printing.
///
/// ```
/// use order_workflow::debug_with_pgpool;
/// use sqlx::PgPool;
///
/// pub struct AuditReader {
///     pool: PgPool,
///     batch_size: usize,
/// }
///
/// debug_with_pgpool!(AuditReader { pool: PgPool, batch_size });
/// ```
#[macro_export]
macro_rules! debug_with_pgpool {
    ($struct_name:ident { $pool_field:ident: PgPool $(, $field:ident)* $(,)? }) => {
        impl std::fmt::Debug for $struct_name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.debug_struct(stringify!($struct_name))
                    .field(stringify!($pool_field), &"PgPool")
                    $(
                        .field(stringify!($field), &self.$field)
                    )*
                    .finish()
            }
        }
    };
}
