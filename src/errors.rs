use thiserror::Error;

pub type KvdbResult<T> = Result<T, KvdbError>;

#[derive(Error, Debug)]
pub enum KvdbError {
    #[error("Invalid connection string: {0}")]
    InvalidUri(#[from] url::ParseError),

    #[error("This type of database [{0}] didn't exist")]
    UnknownScheme(String),

    #[error("Connection string is missing the {0}")]
    MissingComponent(&'static str),

    #[error("wrong {name} parameter: {value:?}")]
    InvalidParameter { name: &'static str, value: String },

    #[error("Password not match for database {0}")]
    PasswordMismatch(String),

    #[error("{0} already existed")]
    AlreadyExisted(String),

    #[error("no such key in DB: {0}")]
    NotFound(String),

    #[error("could not open bucket, {0}")]
    BucketUnavailable(String),

    #[error("IO Error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[cfg(feature = "redb")]
    #[error(transparent)]
    Redb(#[from] RedbError),

    #[cfg(feature = "redis")]
    #[error("Redis Error: {0}")]
    Redis(#[from] redis::RedisError),
}

#[cfg(feature = "redb")]
#[derive(Error, Debug)]
pub enum RedbError {
    #[error(transparent)]
    DatabaseError(#[from] redb::DatabaseError),
    #[error(transparent)]
    TransactionError(#[from] redb::TransactionError),
    #[error(transparent)]
    TableError(#[from] redb::TableError),
    #[error(transparent)]
    CommitError(#[from] redb::CommitError),
    #[error(transparent)]
    StorageError(#[from] redb::StorageError),
}

#[cfg(feature = "redb")]
macro_rules! impl_from_redb {
    ($($err:ty => $variant:ident),*) => {
        $(
            impl From<$err> for KvdbError {
                fn from(err: $err) -> Self {
                    KvdbError::Redb(RedbError::$variant(err))
                }
            }
        )*
    };
}

#[cfg(feature = "redb")]
impl_from_redb!(
    redb::DatabaseError => DatabaseError,
    redb::TransactionError => TransactionError,
    redb::TableError => TableError,
    redb::CommitError => CommitError,
    redb::StorageError => StorageError
);
