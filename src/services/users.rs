use async_trait::async_trait;
use sqlx::PgPool;
use tracing::debug;

use super::memory::{self, MemoryStore};
use super::types::ServiceResult;
use crate::errors::Error;
use crate::models::{AuthUser, Role, User, UserGroup, UserId};
use crate::repos;

/// Role directory: authentication of callers and staff group membership.
#[async_trait]
pub trait UserService: Send + Sync {
    /// Resolves an authenticated user id into a caller with its effective
    /// role. Unknown ids are an authentication failure, not a missing
    /// resource.
    async fn get_auth_user(&self, id: UserId) -> ServiceResult<AuthUser>;
    async fn group_members(&self, group: UserGroup) -> ServiceResult<Vec<User>>;
    /// Adds the named user to a group. Membership is idempotent.
    async fn add_to_group(&self, username: &str, group: UserGroup) -> ServiceResult<User>;
    async fn remove_from_group(&self, user_id: UserId, group: UserGroup) -> ServiceResult<()>;
}

pub struct UserServiceImpl {
    db_pool: PgPool,
}

impl UserServiceImpl {
    pub fn new(db_pool: PgPool) -> Self {
        Self { db_pool }
    }
}

#[async_trait]
impl UserService for UserServiceImpl {
    async fn get_auth_user(&self, id: UserId) -> ServiceResult<AuthUser> {
        let mut conn = self.db_pool.acquire().await?;

        let (user, is_superuser, groups) = repos::user::auth_parts(&mut conn, id)
            .await?
            .ok_or(Error::Forbidden)?;
        let role = Role::resolve(is_superuser, &groups);
        debug!("Resolved user {} as {:?}", user.username, role);

        Ok(AuthUser {
            id: user.id,
            username: user.username,
            email: user.email,
            role,
        })
    }

    async fn group_members(&self, group: UserGroup) -> ServiceResult<Vec<User>> {
        let mut conn = self.db_pool.acquire().await?;

        Ok(repos::user::group_members(&mut conn, group.name()).await?)
    }

    async fn add_to_group(&self, username: &str, group: UserGroup) -> ServiceResult<User> {
        let mut conn = self.db_pool.acquire().await?;

        let user = repos::user::get_by_username(&mut conn, username)
            .await?
            .ok_or(Error::NotFound)?;
        repos::user::add_to_group(&mut conn, user.id, group.name()).await?;
        debug!("Added user {} to group {}", user.username, group.name());

        Ok(user)
    }

    async fn remove_from_group(&self, user_id: UserId, group: UserGroup) -> ServiceResult<()> {
        let mut conn = self.db_pool.acquire().await?;

        let user = repos::user::get(&mut conn, user_id)
            .await?
            .ok_or(Error::NotFound)?;
        repos::user::remove_from_group(&mut conn, user.id, group.name()).await?;
        debug!("Removed user {} from group {}", user.username, group.name());

        Ok(())
    }
}

pub struct UserServiceMemory {
    inner: MemoryStore,
}

impl UserServiceMemory {
    pub fn new(inner: MemoryStore) -> Self {
        Self { inner }
    }
}

#[async_trait]
impl UserService for UserServiceMemory {
    async fn get_auth_user(&self, id: UserId) -> ServiceResult<AuthUser> {
        let state = memory::lock(&self.inner);

        let stored = state.users.get(&id).ok_or(Error::Forbidden)?;
        let role = Role::resolve(stored.is_superuser, &stored.groups);

        Ok(AuthUser {
            id: stored.user.id,
            username: stored.user.username.clone(),
            email: stored.user.email.clone(),
            role,
        })
    }

    async fn group_members(&self, group: UserGroup) -> ServiceResult<Vec<User>> {
        let state = memory::lock(&self.inner);

        Ok(state
            .users
            .values()
            .filter(|stored| stored.groups.iter().any(|g| g == group.name()))
            .map(|stored| stored.user.clone())
            .collect())
    }

    async fn add_to_group(&self, username: &str, group: UserGroup) -> ServiceResult<User> {
        let mut state = memory::lock(&self.inner);

        let stored = state
            .users
            .values_mut()
            .find(|stored| stored.user.username == username)
            .ok_or(Error::NotFound)?;
        if !stored.groups.iter().any(|g| g == group.name()) {
            stored.groups.push(group.name().to_string());
        }

        Ok(stored.user.clone())
    }

    async fn remove_from_group(&self, user_id: UserId, group: UserGroup) -> ServiceResult<()> {
        let mut state = memory::lock(&self.inner);

        let stored = state.users.get_mut(&user_id).ok_or(Error::NotFound)?;
        stored.groups.retain(|g| g != group.name());

        Ok(())
    }
}
