//! PostgreSQL Repository Implementations
//!
//! Race-sensitive operations (rotation, token consumption, merge, user
//! writes) rely on conditional writes and row locks, so any number of API
//! instances can share one database.

use chrono::{DateTime, Utc};
use platform::client::ClientMeta;
use platform::password::HashedPassword;
use sqlx::{PgExecutor, PgPool, Postgres, Transaction};
use uuid::Uuid;

use crate::domain::entity::{
    audit_event::AuditEvent,
    ephemeral_token::{EphemeralToken, EphemeralTokenKind},
    refresh_session::RefreshSession,
    user::{GoogleIdentity, LocalIdentity, MergedIdentities, MicrosoftIdentity, User},
};
use crate::domain::repository::{
    AuditLogRepository, EphemeralTokenRepository, PasswordResetApplied, RefreshSessionRepository,
    UserRepository,
};
use crate::domain::value_object::{
    email::Email,
    full_name::FullName,
    identity::ProviderSubject,
    ids::{EphemeralTokenId, RefreshSessionId, UserId},
    user_role::UserRole,
};
use crate::error::{AuthError, AuthResult};

/// PostgreSQL-backed auth repository
#[derive(Clone)]
pub struct PgAuthRepository {
    pool: PgPool,
}

impl PgAuthRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

macro_rules! select_users {
    ($tail:literal) => {
        concat!(
            r#"
            SELECT
                user_id,
                full_name,
                role,
                email_verified_at,
                local_username,
                local_password_hash,
                local_enabled,
                google_sub,
                google_email,
                ms_tid,
                ms_oid,
                ms_email,
                created_at,
                updated_at,
                version
            FROM auth_users
            "#,
            $tail
        )
    };
}

macro_rules! select_sessions {
    ($tail:literal) => {
        concat!(
            r#"
            SELECT
                session_id,
                user_id,
                token_hash,
                client_ip,
                user_agent,
                expires_at,
                revoked_at,
                created_at
            FROM auth_refresh_sessions
            "#,
            $tail
        )
    };
}

/// Unique violations on identity columns become domain conflicts
fn map_user_write_error(e: sqlx::Error) -> AuthError {
    if let sqlx::Error::Database(db) = &e {
        match db.constraint() {
            Some("auth_users_local_username_key") => return AuthError::EmailInUse,
            Some("auth_users_google_sub_key" | "auth_users_microsoft_key") => {
                return AuthError::AlreadyLinkedElsewhere;
            }
            _ => {}
        }
    }
    AuthError::Database(e)
}

/// Overwrite the row if it is still at `user.version`; returns rows touched
async fn write_user<'e, E>(executor: E, user: &User) -> AuthResult<u64>
where
    E: PgExecutor<'e>,
{
    let local = user.local.as_ref();
    let google = user.google.as_ref();
    let microsoft = user.microsoft.as_ref();

    let affected = sqlx::query(
        r#"
        UPDATE auth_users SET
            full_name = $2,
            role = $3,
            email_verified_at = $4,
            local_username = $5,
            local_password_hash = $6,
            local_enabled = $7,
            google_sub = $8,
            google_email = $9,
            ms_tid = $10,
            ms_oid = $11,
            ms_email = $12,
            updated_at = $13,
            version = version + 1
        WHERE user_id = $1 AND version = $14
        "#,
    )
    .bind(user.user_id.as_uuid())
    .bind(user.full_name.as_str())
    .bind(user.role.code())
    .bind(user.email_verified_at)
    .bind(local.map(|l| l.username.as_str()))
    .bind(local.map(|l| l.password_hash.as_phc_string()))
    .bind(local.is_some_and(|l| l.enabled))
    .bind(google.map(|g| g.subject.as_str()))
    .bind(google.and_then(|g| g.email.as_deref()))
    .bind(microsoft.map(|m| m.tenant_id))
    .bind(microsoft.map(|m| m.object_id))
    .bind(microsoft.and_then(|m| m.email.as_deref()))
    .bind(user.updated_at)
    .bind(user.version)
    .execute(executor)
    .await
    .map_err(map_user_write_error)?
    .rows_affected();

    Ok(affected)
}

/// Why a version-guarded write matched no row
async fn stale_or_missing<'e, E>(executor: E, user_id: &UserId) -> AuthResult<AuthError>
where
    E: PgExecutor<'e>,
{
    let exists = sqlx::query_scalar::<_, bool>(
        "SELECT EXISTS (SELECT 1 FROM auth_users WHERE user_id = $1)",
    )
    .bind(user_id.as_uuid())
    .fetch_one(executor)
    .await?;

    Ok(if exists {
        AuthError::ConcurrentUpdate
    } else {
        AuthError::UserNotFound
    })
}

// ============================================================================
// User Repository Implementation
// ============================================================================

impl UserRepository for PgAuthRepository {
    async fn create_user(&self, user: &User) -> AuthResult<()> {
        let local = user.local.as_ref();
        let google = user.google.as_ref();
        let microsoft = user.microsoft.as_ref();

        sqlx::query(
            r#"
            INSERT INTO auth_users (
                user_id,
                full_name,
                role,
                email_verified_at,
                local_username,
                local_password_hash,
                local_enabled,
                google_sub,
                google_email,
                ms_tid,
                ms_oid,
                ms_email,
                created_at,
                updated_at,
                version
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15)
            "#,
        )
        .bind(user.user_id.as_uuid())
        .bind(user.full_name.as_str())
        .bind(user.role.code())
        .bind(user.email_verified_at)
        .bind(local.map(|l| l.username.as_str()))
        .bind(local.map(|l| l.password_hash.as_phc_string()))
        .bind(local.is_some_and(|l| l.enabled))
        .bind(google.map(|g| g.subject.as_str()))
        .bind(google.and_then(|g| g.email.as_deref()))
        .bind(microsoft.map(|m| m.tenant_id))
        .bind(microsoft.map(|m| m.object_id))
        .bind(microsoft.and_then(|m| m.email.as_deref()))
        .bind(user.created_at)
        .bind(user.updated_at)
        .bind(user.version)
        .execute(&self.pool)
        .await
        .map_err(map_user_write_error)?;

        Ok(())
    }

    async fn find_user_by_id(&self, user_id: &UserId) -> AuthResult<Option<User>> {
        sqlx::query_as::<_, UserRow>(select_users!("WHERE user_id = $1"))
            .bind(user_id.as_uuid())
            .fetch_optional(&self.pool)
            .await?
            .map(UserRow::into_user)
            .transpose()
    }

    async fn find_user_by_local_username(&self, username: &Email) -> AuthResult<Option<User>> {
        sqlx::query_as::<_, UserRow>(select_users!("WHERE local_username = $1"))
            .bind(username.as_str())
            .fetch_optional(&self.pool)
            .await?
            .map(UserRow::into_user)
            .transpose()
    }

    async fn find_user_by_provider_subject(
        &self,
        subject: &ProviderSubject,
    ) -> AuthResult<Option<User>> {
        let row = match subject {
            ProviderSubject::Google { subject } => {
                sqlx::query_as::<_, UserRow>(select_users!("WHERE google_sub = $1"))
                    .bind(subject)
                    .fetch_optional(&self.pool)
                    .await?
            }
            ProviderSubject::Microsoft {
                tenant_id,
                object_id,
            } => {
                sqlx::query_as::<_, UserRow>(select_users!("WHERE ms_tid = $1 AND ms_oid = $2"))
                    .bind(tenant_id)
                    .bind(object_id)
                    .fetch_optional(&self.pool)
                    .await?
            }
        };

        row.map(UserRow::into_user).transpose()
    }

    async fn update_user(&self, user: &User) -> AuthResult<()> {
        match write_user(&self.pool, user).await? {
            0 => Err(stale_or_missing(&self.pool, &user.user_id).await?),
            _ => Ok(()),
        }
    }

    async fn replace_password(
        &self,
        user: &User,
        password_hash: &HashedPassword,
    ) -> AuthResult<u64> {
        let mut tx = self.pool.begin().await?;

        let updated = sqlx::query(
            r#"
            UPDATE auth_users
            SET local_password_hash = $3, updated_at = now(), version = version + 1
            WHERE user_id = $1 AND version = $2 AND local_username IS NOT NULL
            "#,
        )
        .bind(user.user_id.as_uuid())
        .bind(user.version)
        .bind(password_hash.as_phc_string())
        .execute(&mut *tx)
        .await?
        .rows_affected();

        if updated == 0 {
            let err = if user.local.is_none() {
                AuthError::IdentityNotLinked
            } else {
                stale_or_missing(&mut *tx, &user.user_id).await?
            };
            tx.rollback().await?;
            return Err(err);
        }

        let revoked = revoke_sessions_of(&mut *tx, &user.user_id).await?;
        tx.commit().await?;

        Ok(revoked)
    }

    async fn merge_users(
        &self,
        source: &UserId,
        destination: &UserId,
    ) -> AuthResult<MergedIdentities> {
        let mut tx = self.pool.begin().await?;

        // Locks both rows in a fixed order so concurrent merges cannot deadlock
        let rows = sqlx::query_as::<_, UserRow>(select_users!(
            "WHERE user_id = ANY($1) ORDER BY user_id FOR UPDATE"
        ))
        .bind(vec![*source.as_uuid(), *destination.as_uuid()])
        .fetch_all(&mut *tx)
        .await?;

        let mut source_user = None;
        let mut destination_user = None;
        for row in rows {
            let user = row.into_user()?;
            if user.user_id == *source {
                source_user = Some(user);
            } else if user.user_id == *destination {
                destination_user = Some(user);
            }
        }
        let (Some(source_user), Some(mut destination_user)) = (source_user, destination_user)
        else {
            return Err(AuthError::UserNotFound);
        };

        let merged = destination_user.absorb(source_user)?;

        // Free the unique identity columns before the destination takes them
        sqlx::query("DELETE FROM auth_users WHERE user_id = $1")
            .bind(source.as_uuid())
            .execute(&mut *tx)
            .await?;

        // Rows are locked, so the version read above still holds
        if write_user(&mut *tx, &destination_user).await? == 0 {
            tx.rollback().await?;
            return Err(AuthError::ConcurrentUpdate);
        }

        tx.commit().await?;

        Ok(merged)
    }
}

// ============================================================================
// Refresh Session Repository Implementation
// ============================================================================

async fn insert_session<'e, E>(executor: E, session: &RefreshSession) -> AuthResult<()>
where
    E: PgExecutor<'e>,
{
    sqlx::query(
        r#"
        INSERT INTO auth_refresh_sessions (
            session_id,
            user_id,
            token_hash,
            client_ip,
            user_agent,
            expires_at,
            revoked_at,
            created_at
        ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
        "#,
    )
    .bind(session.session_id.as_uuid())
    .bind(session.user_id.as_uuid())
    .bind(&session.token_hash)
    .bind(session.client.ip_string())
    .bind(&session.client.user_agent)
    .bind(session.expires_at)
    .bind(session.revoked_at)
    .bind(session.created_at)
    .execute(executor)
    .await?;

    Ok(())
}

async fn revoke_sessions_of<'e, E>(executor: E, user_id: &UserId) -> AuthResult<u64>
where
    E: PgExecutor<'e>,
{
    let revoked = sqlx::query(
        r#"
        UPDATE auth_refresh_sessions
        SET revoked_at = now()
        WHERE user_id = $1 AND revoked_at IS NULL
        "#,
    )
    .bind(user_id.as_uuid())
    .execute(executor)
    .await?
    .rows_affected();

    Ok(revoked)
}

impl RefreshSessionRepository for PgAuthRepository {
    async fn create_session(&self, session: &RefreshSession) -> AuthResult<()> {
        insert_session(&self.pool, session).await
    }

    async fn find_active_session(&self, token_hash: &str) -> AuthResult<Option<RefreshSession>> {
        let row = sqlx::query_as::<_, RefreshSessionRow>(select_sessions!(
            "WHERE token_hash = $1 AND revoked_at IS NULL AND expires_at > now()"
        ))
        .bind(token_hash)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(RefreshSessionRow::into_session))
    }

    async fn rotate_session(
        &self,
        current: &RefreshSessionId,
        replacement: &RefreshSession,
    ) -> AuthResult<bool> {
        let mut tx = self.pool.begin().await?;

        // A concurrent rotation blocks on the row lock and then matches nothing
        let revoked = sqlx::query(
            r#"
            UPDATE auth_refresh_sessions
            SET revoked_at = now()
            WHERE session_id = $1 AND revoked_at IS NULL AND expires_at > now()
            "#,
        )
        .bind(current.as_uuid())
        .execute(&mut *tx)
        .await?
        .rows_affected();

        if revoked == 0 {
            tx.rollback().await?;
            return Ok(false);
        }

        insert_session(&mut *tx, replacement).await?;
        tx.commit().await?;

        Ok(true)
    }

    async fn revoke_session_by_hash(&self, token_hash: &str) -> AuthResult<Option<UserId>> {
        let owner = sqlx::query_scalar::<_, Uuid>(
            r#"
            UPDATE auth_refresh_sessions
            SET revoked_at = now()
            WHERE token_hash = $1 AND revoked_at IS NULL
            RETURNING user_id
            "#,
        )
        .bind(token_hash)
        .fetch_optional(&self.pool)
        .await?;

        Ok(owner.map(UserId::from_uuid))
    }

    async fn revoke_all_sessions(&self, user_id: &UserId) -> AuthResult<u64> {
        revoke_sessions_of(&self.pool, user_id).await
    }

    async fn purge_expired_sessions(&self) -> AuthResult<u64> {
        let deleted = sqlx::query("DELETE FROM auth_refresh_sessions WHERE expires_at <= now()")
            .execute(&self.pool)
            .await?
            .rows_affected();

        Ok(deleted)
    }
}

// ============================================================================
// Ephemeral Token Repository Implementation
// ============================================================================

/// Mark a usable token used inside `tx`; the row lock makes a second
/// concurrent caller match nothing.
async fn consume_token(
    tx: &mut Transaction<'_, Postgres>,
    token_hash: &str,
    kind: EphemeralTokenKind,
) -> AuthResult<Option<UserId>> {
    let user_id = sqlx::query_scalar::<_, Uuid>(
        r#"
        UPDATE auth_ephemeral_tokens
        SET used_at = now()
        WHERE token_hash = $1 AND kind = $2 AND used_at IS NULL AND expires_at > now()
        RETURNING user_id
        "#,
    )
    .bind(token_hash)
    .bind(kind.code())
    .fetch_optional(&mut **tx)
    .await?;

    Ok(user_id.map(UserId::from_uuid))
}

impl EphemeralTokenRepository for PgAuthRepository {
    async fn replace_token(&self, token: &EphemeralToken) -> AuthResult<()> {
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r#"
            DELETE FROM auth_ephemeral_tokens
            WHERE user_id = $1 AND kind = $2 AND used_at IS NULL
            "#,
        )
        .bind(token.user_id.as_uuid())
        .bind(token.kind.code())
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r#"
            INSERT INTO auth_ephemeral_tokens (
                token_id,
                user_id,
                kind,
                token_hash,
                expires_at,
                used_at,
                created_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(token.token_id.as_uuid())
        .bind(token.user_id.as_uuid())
        .bind(token.kind.code())
        .bind(&token.token_hash)
        .bind(token.expires_at)
        .bind(token.used_at)
        .bind(token.created_at)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        Ok(())
    }

    async fn find_usable_token(
        &self,
        token_hash: &str,
        kind: EphemeralTokenKind,
    ) -> AuthResult<Option<EphemeralToken>> {
        sqlx::query_as::<_, EphemeralTokenRow>(
            r#"
            SELECT
                token_id,
                user_id,
                kind,
                token_hash,
                expires_at,
                used_at,
                created_at
            FROM auth_ephemeral_tokens
            WHERE token_hash = $1 AND kind = $2 AND used_at IS NULL AND expires_at > now()
            "#,
        )
        .bind(token_hash)
        .bind(kind.code())
        .fetch_optional(&self.pool)
        .await?
        .map(EphemeralTokenRow::into_token)
        .transpose()
    }

    async fn complete_email_verification(&self, token_hash: &str) -> AuthResult<Option<UserId>> {
        let mut tx = self.pool.begin().await?;

        let Some(user_id) =
            consume_token(&mut tx, token_hash, EphemeralTokenKind::EmailVerification).await?
        else {
            tx.rollback().await?;
            return Ok(None);
        };

        // Keeps the first verification timestamp
        sqlx::query(
            r#"
            UPDATE auth_users
            SET email_verified_at = COALESCE(email_verified_at, now()),
                updated_at = now(),
                version = version + 1
            WHERE user_id = $1
            "#,
        )
        .bind(user_id.as_uuid())
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        Ok(Some(user_id))
    }

    async fn complete_password_reset(
        &self,
        token_hash: &str,
        password_hash: &HashedPassword,
    ) -> AuthResult<Option<PasswordResetApplied>> {
        let mut tx = self.pool.begin().await?;

        let Some(user_id) =
            consume_token(&mut tx, token_hash, EphemeralTokenKind::PasswordReset).await?
        else {
            tx.rollback().await?;
            return Ok(None);
        };

        let updated = sqlx::query(
            r#"
            UPDATE auth_users
            SET local_password_hash = $2, updated_at = now(), version = version + 1
            WHERE user_id = $1 AND local_username IS NOT NULL
            "#,
        )
        .bind(user_id.as_uuid())
        .bind(password_hash.as_phc_string())
        .execute(&mut *tx)
        .await?
        .rows_affected();

        if updated == 0 {
            tx.rollback().await?;
            return Err(AuthError::IdentityNotLinked);
        }

        let sessions_revoked = revoke_sessions_of(&mut *tx, &user_id).await?;
        tx.commit().await?;

        Ok(Some(PasswordResetApplied {
            user_id,
            sessions_revoked,
        }))
    }

    async fn purge_expired_tokens(&self) -> AuthResult<u64> {
        let deleted = sqlx::query(
            "DELETE FROM auth_ephemeral_tokens WHERE expires_at <= now() OR used_at IS NOT NULL",
        )
        .execute(&self.pool)
        .await?
        .rows_affected();

        Ok(deleted)
    }
}

// ============================================================================
// Audit Log Repository Implementation
// ============================================================================

impl AuditLogRepository for PgAuthRepository {
    async fn record_event(&self, event: &AuditEvent) -> AuthResult<()> {
        sqlx::query(
            r#"
            INSERT INTO auth_audit_log (
                event_id,
                user_id,
                action,
                metadata,
                client_ip,
                user_agent,
                created_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(event.event_id.as_uuid())
        .bind(event.user_id.map(|id| *id.as_uuid()))
        .bind(event.action.code())
        .bind(sqlx::types::Json(&event.metadata))
        .bind(event.client.ip_string())
        .bind(&event.client.user_agent)
        .bind(event.created_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}

// ============================================================================
// Row Types
// ============================================================================

#[derive(sqlx::FromRow)]
struct UserRow {
    user_id: Uuid,
    full_name: String,
    role: String,
    email_verified_at: Option<DateTime<Utc>>,
    local_username: Option<String>,
    local_password_hash: Option<String>,
    local_enabled: bool,
    google_sub: Option<String>,
    google_email: Option<String>,
    ms_tid: Option<Uuid>,
    ms_oid: Option<Uuid>,
    ms_email: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    version: i64,
}

impl UserRow {
    fn into_user(self) -> AuthResult<User> {
        let role = UserRole::from_code(&self.role)
            .ok_or_else(|| AuthError::Internal(format!("Invalid role in database: {}", self.role)))?;

        let local = match (self.local_username, self.local_password_hash) {
            (Some(username), Some(hash)) => Some(LocalIdentity {
                username: Email::from_db(username),
                password_hash: HashedPassword::from_phc_string(hash)
                    .map_err(|e| AuthError::Internal(format!("Invalid password hash: {e}")))?,
                enabled: self.local_enabled,
            }),
            _ => None,
        };

        let google = self.google_sub.map(|subject| GoogleIdentity {
            subject,
            email: self.google_email,
        });

        let microsoft = match (self.ms_tid, self.ms_oid) {
            (Some(tenant_id), Some(object_id)) => Some(MicrosoftIdentity {
                tenant_id,
                object_id,
                email: self.ms_email,
            }),
            _ => None,
        };

        Ok(User {
            user_id: UserId::from_uuid(self.user_id),
            full_name: FullName::from_db(self.full_name),
            role,
            email_verified_at: self.email_verified_at,
            local,
            google,
            microsoft,
            created_at: self.created_at,
            updated_at: self.updated_at,
            version: self.version,
        })
    }
}

#[derive(sqlx::FromRow)]
struct RefreshSessionRow {
    session_id: Uuid,
    user_id: Uuid,
    token_hash: String,
    client_ip: Option<String>,
    user_agent: Option<String>,
    expires_at: DateTime<Utc>,
    revoked_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
}

impl RefreshSessionRow {
    fn into_session(self) -> RefreshSession {
        RefreshSession {
            session_id: RefreshSessionId::from_uuid(self.session_id),
            user_id: UserId::from_uuid(self.user_id),
            token_hash: self.token_hash,
            client: ClientMeta::new(
                self.client_ip.and_then(|ip| ip.parse().ok()),
                self.user_agent,
            ),
            expires_at: self.expires_at,
            revoked_at: self.revoked_at,
            created_at: self.created_at,
        }
    }
}

#[derive(sqlx::FromRow)]
struct EphemeralTokenRow {
    token_id: Uuid,
    user_id: Uuid,
    kind: String,
    token_hash: String,
    expires_at: DateTime<Utc>,
    used_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
}

impl EphemeralTokenRow {
    fn into_token(self) -> AuthResult<EphemeralToken> {
        let kind = EphemeralTokenKind::from_code(&self.kind)
            .ok_or_else(|| AuthError::Internal(format!("Invalid token kind: {}", self.kind)))?;

        Ok(EphemeralToken {
            token_id: EphemeralTokenId::from_uuid(self.token_id),
            user_id: UserId::from_uuid(self.user_id),
            kind,
            token_hash: self.token_hash,
            expires_at: self.expires_at,
            used_at: self.used_at,
            created_at: self.created_at,
        })
    }
}
