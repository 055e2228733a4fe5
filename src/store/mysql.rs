//! MySQL-backed tenant store.
//!
//! Integer columns are cast to `SIGNED` so they always decode as `i64`
//! regardless of the declared column width; boolean flags are read the
//! same way and treated as true when non-zero.

use std::time::Duration;

use sqlx::mysql::{MySqlPool, MySqlPoolOptions, MySqlRow};
use sqlx::Row;

use crate::store::{SnapshotSource, StoreError};
use crate::tenants::types::{Domain, DomainAlias, DomainFile, PostOverride, RedirectPolicy};

/// A row type that can be bulk-loaded from a MySQL table.
pub trait MySqlEntity: Sized + Send + Unpin + 'static {
    /// Full `SELECT` statement for the table.
    const SELECT: &'static str;

    fn from_row(row: &MySqlRow) -> Result<Self, sqlx::Error>;
}

/// Connection pool shared by all four snapshot sources.
#[derive(Clone, Debug)]
pub struct MySqlStore {
    pool: MySqlPool,
}

impl MySqlStore {
    /// Connect to the database. Fails if the first connection cannot be made.
    pub async fn connect(url: &str, max_connections: u32) -> Result<Self, StoreError> {
        let pool = MySqlPoolOptions::new()
            .max_connections(max_connections)
            .acquire_timeout(Duration::from_secs(10))
            .connect(url)
            .await?;
        tracing::info!(max_connections, "MySQL pool ready");
        Ok(Self { pool })
    }

    pub fn from_pool(pool: MySqlPool) -> Self {
        Self { pool }
    }
}

impl<T: MySqlEntity> SnapshotSource<T> for MySqlStore {
    async fn fetch_all(&self) -> Result<Vec<T>, StoreError> {
        let rows = sqlx::query(T::SELECT).fetch_all(&self.pool).await?;
        let mut out = Vec::with_capacity(rows.len());
        for row in &rows {
            out.push(T::from_row(row)?);
        }
        Ok(out)
    }
}

fn text(row: &MySqlRow, column: &str) -> Result<String, sqlx::Error> {
    Ok(row.try_get::<Option<String>, _>(column)?.unwrap_or_default())
}

fn int(row: &MySqlRow, column: &str) -> Result<i64, sqlx::Error> {
    Ok(row.try_get::<Option<i64>, _>(column)?.unwrap_or_default())
}

impl MySqlEntity for Domain {
    const SELECT: &'static str = "SELECT CAST(id AS SIGNED) AS id, title, host_public, host_private, skin, \
         service_dle, service_imager, service_sitemap, service_dns, \
         CAST(news_number AS SIGNED) AS news_number, port_public, scheme_public, \
         CAST(disallow_robots AS SIGNED) AS disallow_robots \
         FROM flix_domain";

    fn from_row(row: &MySqlRow) -> Result<Self, sqlx::Error> {
        Ok(Domain {
            id: int(row, "id")?,
            title: text(row, "title")?,
            host_public: text(row, "host_public")?,
            host_private: text(row, "host_private")?,
            skin: text(row, "skin")?,
            service_dle: text(row, "service_dle")?,
            service_imager: text(row, "service_imager")?,
            service_sitemap: text(row, "service_sitemap")?,
            service_dns: text(row, "service_dns")?,
            news_number: int(row, "news_number")?,
            port_public: text(row, "port_public")?,
            scheme_public: text(row, "scheme_public")?,
            disallow_robots: int(row, "disallow_robots")? != 0,
        })
    }
}

impl MySqlEntity for DomainAlias {
    const SELECT: &'static str =
        "SELECT CAST(domain_id AS SIGNED) AS domain_id, host FROM flix_domain_alias";

    fn from_row(row: &MySqlRow) -> Result<Self, sqlx::Error> {
        Ok(DomainAlias {
            domain_id: int(row, "domain_id")?,
            host: text(row, "host")?,
        })
    }
}

impl MySqlEntity for DomainFile {
    const SELECT: &'static str = "SELECT CAST(id AS SIGNED) AS id, CAST(domain_id AS SIGNED) AS domain_id, \
         path, content_type, body FROM flix_domain_files";

    fn from_row(row: &MySqlRow) -> Result<Self, sqlx::Error> {
        Ok(DomainFile {
            id: int(row, "id")?,
            domain_id: int(row, "domain_id")?,
            path: text(row, "path")?,
            content_type: text(row, "content_type")?,
            body: text(row, "body")?,
        })
    }
}

impl MySqlEntity for PostOverride {
    const SELECT: &'static str = "SELECT CAST(id AS SIGNED) AS id, CAST(domain_id AS SIGNED) AS domain_id, \
         CAST(post_id AS SIGNED) AS post_id, alt_name, \
         CAST(approve AS SIGNED) AS approve, CAST(redirect AS SIGNED) AS redirect \
         FROM flix_post";

    fn from_row(row: &MySqlRow) -> Result<Self, sqlx::Error> {
        let post_id = int(row, "post_id")?;
        Ok(PostOverride {
            id: int(row, "id")?,
            domain_id: int(row, "domain_id")?,
            // Negative ids can never match a URL.
            post_id: u64::try_from(post_id).unwrap_or(0),
            alt_name: text(row, "alt_name")?,
            approve: int(row, "approve")? != 0,
            redirect: RedirectPolicy::from(int(row, "redirect")?),
        })
    }
}
