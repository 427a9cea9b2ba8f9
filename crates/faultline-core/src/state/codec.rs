use rusqlite::ToSql;
use rusqlite::types::{FromSql, FromSqlError, FromSqlResult, ToSqlOutput, ValueRef};

use crate::models::{Category, Environment, Severity};

macro_rules! text_enum_sql {
    ($ty:ty, $label:literal) => {
        impl ToSql for $ty {
            fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
                Ok(ToSqlOutput::from(self.as_str()))
            }
        }

        impl FromSql for $ty {
            fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
                let raw = value.as_str()?;
                <$ty>::parse(raw)
                    .ok_or_else(|| FromSqlError::Other(format!("unknown {}: {raw}", $label).into()))
            }
        }
    };
}

text_enum_sql!(Severity, "severity");
text_enum_sql!(Category, "category");
text_enum_sql!(Environment, "environment");
