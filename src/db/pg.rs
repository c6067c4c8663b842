//! PostgreSQL implementation of [`SqlSession`] on top of tokio-postgres.

use std::error::Error;

use async_trait::async_trait;
use bytes::BytesMut;
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use rust_decimal::Decimal;
use tokio::task::JoinHandle;
use tokio_postgres::types::{IsNull, ToSql, Type, WrongType, to_sql_checked};
use tokio_postgres::{Client, NoTls};
use tracing::{debug, error, info};

use super::session::SqlSession;
use crate::config::ConnectionParams;
use crate::core::{LibraryError, ResultSet, Row, Value};

pub struct PgSession {
    /// `None` once the session is closed.
    client: Option<Client>,
    connection: Option<JoinHandle<()>>,
    in_transaction: bool,
}

impl PgSession {
    pub async fn connect(params: &ConnectionParams) -> Result<Self, LibraryError> {
        let (client, connection) = params
            .to_pg_config()
            .connect(NoTls)
            .await
            .map_err(|e| LibraryError::Connection(e.to_string()))?;

        let connection = tokio::spawn(async move {
            if let Err(e) = connection.await {
                error!("Database connection error: {e}");
            }
        });

        info!("Connected to PostgreSQL: {params}");
        Ok(Self {
            client: Some(client),
            connection: Some(connection),
            in_transaction: false,
        })
    }

    fn client(&self) -> Result<&Client, LibraryError> {
        self.client.as_ref().ok_or(LibraryError::NotConnected)
    }

    fn bind(params: &[Value]) -> Vec<&(dyn ToSql + Sync)> {
        params.iter().map(|v| v as &(dyn ToSql + Sync)).collect()
    }
}

#[async_trait]
impl SqlSession for PgSession {
    async fn begin(&mut self) -> Result<(), LibraryError> {
        if !self.in_transaction {
            self.client()?.batch_execute("BEGIN").await?;
            self.in_transaction = true;
        }
        Ok(())
    }

    async fn commit(&mut self) -> Result<(), LibraryError> {
        if self.in_transaction {
            self.in_transaction = false;
            self.client()?.batch_execute("COMMIT").await?;
        }
        Ok(())
    }

    async fn rollback(&mut self) -> Result<(), LibraryError> {
        if self.in_transaction {
            self.in_transaction = false;
            self.client()?.batch_execute("ROLLBACK").await?;
        }
        Ok(())
    }

    async fn execute(&mut self, sql: &str, params: &[Value]) -> Result<u64, LibraryError> {
        debug!("execute: {sql}");
        Ok(self.client()?.execute(sql, &Self::bind(params)).await?)
    }

    async fn query(&mut self, sql: &str, params: &[Value]) -> Result<ResultSet, LibraryError> {
        debug!("query: {sql}");
        // Prepared first so column names are known even for zero rows.
        let client = self.client()?;
        let statement = client.prepare(sql).await?;
        let columns = statement
            .columns()
            .iter()
            .map(|c| c.name().to_string())
            .collect();
        let rows = client.query(&statement, &Self::bind(params)).await?;
        let rows = rows
            .iter()
            .map(decode_row)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(ResultSet::new(columns, rows))
    }

    async fn batch_execute(&mut self, sql: &str) -> Result<(), LibraryError> {
        debug!("batch: {sql}");
        Ok(self.client()?.batch_execute(sql).await?)
    }

    async fn close(&mut self) -> Result<(), LibraryError> {
        if self.in_transaction {
            self.rollback().await?;
        }
        // Dropping the client sends Terminate; the connection task then ends.
        drop(self.client.take());
        if let Some(connection) = self.connection.take() {
            connection
                .await
                .map_err(|e| LibraryError::Connection(e.to_string()))?;
        }
        info!("Database connection closed");
        Ok(())
    }
}

fn decode_row(row: &tokio_postgres::Row) -> Result<Row, LibraryError> {
    (0..row.len())
        .map(|idx| decode_cell(row, idx))
        .collect::<Result<Vec<_>, _>>()
        .map(Row::new)
}

/// Map a result column to a [`Value`] by its PostgreSQL type.
///
/// Types without a dedicated variant are read as text when the driver
/// allows it, otherwise shown as `<type name>`.
fn decode_cell(row: &tokio_postgres::Row, idx: usize) -> Result<Value, LibraryError> {
    let ty = row.columns()[idx].type_();
    let value = match *ty {
        Type::BOOL => row.try_get::<_, Option<bool>>(idx)?.map(Value::Boolean),
        Type::INT2 => row.try_get::<_, Option<i16>>(idx)?.map(|v| Value::Integer(v.into())),
        Type::INT4 => row.try_get::<_, Option<i32>>(idx)?.map(|v| Value::Integer(v.into())),
        Type::INT8 => row.try_get::<_, Option<i64>>(idx)?.map(Value::Integer),
        Type::OID => row.try_get::<_, Option<u32>>(idx)?.map(|v| Value::Integer(v.into())),
        Type::FLOAT4 => row.try_get::<_, Option<f32>>(idx)?.map(|v| Value::Real(v.into())),
        Type::FLOAT8 => row.try_get::<_, Option<f64>>(idx)?.map(Value::Real),
        Type::NUMERIC => row.try_get::<_, Option<Decimal>>(idx)?.map(Value::Numeric),
        Type::DATE => row.try_get::<_, Option<NaiveDate>>(idx)?.map(Value::Date),
        Type::TIMESTAMP => row.try_get::<_, Option<NaiveDateTime>>(idx)?.map(Value::Timestamp),
        Type::TIMESTAMPTZ => row.try_get::<_, Option<DateTime<Utc>>>(idx)?.map(Value::TimestampTz),
        _ => match row.try_get::<_, Option<String>>(idx) {
            Ok(text) => text.map(Value::Text),
            Err(_) => Some(Value::Text(format!("<{}>", ty.name()))),
        },
    };
    Ok(value.unwrap_or(Value::Null))
}

impl Value {
    /// Whether this variant can be encoded as a parameter of type `ty`.
    fn encodes_as(&self, ty: &Type) -> bool {
        match self {
            Self::Null => true,
            Self::Integer(_) => {
                matches!(*ty, Type::INT2 | Type::INT4 | Type::FLOAT4 | Type::FLOAT8 | Type::NUMERIC)
                    || <i64 as ToSql>::accepts(ty)
            }
            Self::Real(_) => matches!(*ty, Type::FLOAT4 | Type::NUMERIC) || <f64 as ToSql>::accepts(ty),
            Self::Numeric(_) => <Decimal as ToSql>::accepts(ty),
            Self::Text(_) => <String as ToSql>::accepts(ty),
            Self::Boolean(_) => <bool as ToSql>::accepts(ty),
            Self::Date(_) => <NaiveDate as ToSql>::accepts(ty),
            Self::Timestamp(_) => <NaiveDateTime as ToSql>::accepts(ty),
            Self::TimestampTz(_) => <DateTime<Utc> as ToSql>::accepts(ty),
        }
    }
}

impl ToSql for Value {
    fn to_sql(&self, ty: &Type, out: &mut BytesMut) -> Result<IsNull, Box<dyn Error + Sync + Send>> {
        if !self.encodes_as(ty) {
            return Err(Box::new(WrongType::new::<Self>(ty.clone())));
        }
        match self {
            Self::Null => Ok(IsNull::Yes),
            Self::Integer(i) => match *ty {
                Type::INT2 => i16::try_from(*i)?.to_sql(ty, out),
                Type::INT4 => i32::try_from(*i)?.to_sql(ty, out),
                Type::FLOAT4 => (*i as f32).to_sql(ty, out),
                Type::FLOAT8 => (*i as f64).to_sql(ty, out),
                Type::NUMERIC => Decimal::from(*i).to_sql(ty, out),
                _ => i.to_sql(ty, out),
            },
            Self::Real(r) => match *ty {
                Type::FLOAT4 => (*r as f32).to_sql(ty, out),
                Type::NUMERIC => Decimal::try_from(*r)?.to_sql(ty, out),
                _ => r.to_sql(ty, out),
            },
            Self::Numeric(d) => d.to_sql(ty, out),
            Self::Text(s) => s.to_sql(ty, out),
            Self::Boolean(b) => b.to_sql(ty, out),
            Self::Date(d) => d.to_sql(ty, out),
            Self::Timestamp(t) => t.to_sql(ty, out),
            Self::TimestampTz(t) => t.to_sql(ty, out),
        }
    }

    /// Any type some variant encodes; the variant itself is checked in `to_sql`.
    fn accepts(ty: &Type) -> bool {
        [
            Self::Integer(0),
            Self::Real(0.0),
            Self::Numeric(Decimal::ZERO),
            Self::Text(String::new()),
            Self::Boolean(false),
            Self::Date(NaiveDate::MIN),
            Self::Timestamp(NaiveDateTime::MIN),
            Self::TimestampTz(DateTime::<Utc>::MIN_UTC),
        ]
        .iter()
        .any(|v| v.encodes_as(ty))
    }

    to_sql_checked!();
}
