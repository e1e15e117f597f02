use async_trait::async_trait;
use sqlx::PgPool;
use tracing::debug;
use validator::Validate;

use super::memory::{self, MemoryStore, StoredMenuItem};
use super::types::ServiceResult;
use crate::errors::{self, Error};
use crate::models::{
    Category, CategoryId, MenuItem, MenuItemId, MenuItemQuery, MenuItemUpdate, NewCategory,
    NewMenuItem, Page, PriceOrdering,
};
use crate::repos;

/// Catalog of categories and menu items.
#[async_trait]
pub trait CatalogService: Send + Sync {
    async fn list_menu_items(&self, query: MenuItemQuery) -> ServiceResult<Page<MenuItem>>;
    async fn get_menu_item(&self, id: MenuItemId) -> ServiceResult<MenuItem>;
    async fn create_menu_item(&self, data: NewMenuItem) -> ServiceResult<MenuItem>;
    async fn replace_menu_item(&self, id: MenuItemId, data: NewMenuItem) -> ServiceResult<MenuItem>;
    async fn update_menu_item(&self, id: MenuItemId, data: MenuItemUpdate) -> ServiceResult<MenuItem>;
    async fn delete_menu_item(&self, id: MenuItemId) -> ServiceResult<()>;
    async fn list_categories(&self) -> ServiceResult<Vec<Category>>;
    async fn create_category(&self, data: NewCategory) -> ServiceResult<Category>;
    /// Deletes a category; fails while any menu item still references it.
    async fn delete_category(&self, id: CategoryId) -> ServiceResult<()>;
}

pub struct CatalogServiceImpl {
    db_pool: PgPool,
}

impl CatalogServiceImpl {
    pub fn new(db_pool: PgPool) -> Self {
        Self { db_pool }
    }
}

#[async_trait]
impl CatalogService for CatalogServiceImpl {
    async fn list_menu_items(&self, query: MenuItemQuery) -> ServiceResult<Page<MenuItem>> {
        let mut conn = self.db_pool.acquire().await?;

        let rows = repos::menu_item::list(&mut conn, &query).await?;
        let items = rows.into_iter().map(MenuItem::from).collect();

        Ok(query.page_params().apply(items))
    }

    async fn get_menu_item(&self, id: MenuItemId) -> ServiceResult<MenuItem> {
        let mut conn = self.db_pool.acquire().await?;

        let row = repos::menu_item::get(&mut conn, id)
            .await?
            .ok_or(Error::NotFound)?;

        Ok(row.into())
    }

    async fn create_menu_item(&self, data: NewMenuItem) -> ServiceResult<MenuItem> {
        data.validate()?;
        let mut conn = self.db_pool.acquire().await?;

        let id = repos::menu_item::insert(&mut conn, &data).await.map_err(|e| {
            if errors::is_foreign_key_violation(&e) {
                Error::validation("Category does not exist")
            } else {
                e.into()
            }
        })?;
        debug!("Created menu item {} '{}'", id, data.title);

        let row = repos::menu_item::get(&mut conn, id)
            .await?
            .ok_or(Error::NotFound)?;
        Ok(row.into())
    }

    async fn replace_menu_item(&self, id: MenuItemId, data: NewMenuItem) -> ServiceResult<MenuItem> {
        data.validate()?;
        let mut conn = self.db_pool.acquire().await?;

        let affected = repos::menu_item::replace(&mut conn, id, &data).await.map_err(|e| {
            if errors::is_foreign_key_violation(&e) {
                Error::validation("Category does not exist")
            } else {
                e.into()
            }
        })?;
        if affected == 0 {
            return Err(Error::NotFound);
        }

        let row = repos::menu_item::get(&mut conn, id)
            .await?
            .ok_or(Error::NotFound)?;
        Ok(row.into())
    }

    async fn update_menu_item(&self, id: MenuItemId, data: MenuItemUpdate) -> ServiceResult<MenuItem> {
        data.validate()?;
        let mut conn = self.db_pool.acquire().await?;

        let affected = repos::menu_item::update(&mut conn, id, &data).await.map_err(|e| {
            if errors::is_foreign_key_violation(&e) {
                Error::validation("Category does not exist")
            } else {
                e.into()
            }
        })?;
        if affected == 0 {
            return Err(Error::NotFound);
        }

        let row = repos::menu_item::get(&mut conn, id)
            .await?
            .ok_or(Error::NotFound)?;
        Ok(row.into())
    }

    async fn delete_menu_item(&self, id: MenuItemId) -> ServiceResult<()> {
        let mut conn = self.db_pool.acquire().await?;

        if repos::menu_item::delete(&mut conn, id).await? == 0 {
            return Err(Error::NotFound);
        }
        debug!("Deleted menu item {}", id);

        Ok(())
    }

    async fn list_categories(&self) -> ServiceResult<Vec<Category>> {
        let mut conn = self.db_pool.acquire().await?;

        Ok(repos::category::list(&mut conn).await?)
    }

    async fn create_category(&self, data: NewCategory) -> ServiceResult<Category> {
        data.validate()?;
        let mut conn = self.db_pool.acquire().await?;

        let category = repos::category::insert(&mut conn, &data).await.map_err(|e| {
            if errors::is_unique_violation(&e) {
                Error::validation("Category with this slug already exists")
            } else {
                e.into()
            }
        })?;
        debug!("Created category {} '{}'", category.id, category.slug);

        Ok(category)
    }

    async fn delete_category(&self, id: CategoryId) -> ServiceResult<()> {
        let mut conn = self.db_pool.acquire().await?;

        let affected = repos::category::delete(&mut conn, id).await.map_err(|e| {
            if errors::is_foreign_key_violation(&e) {
                Error::validation("Category is referenced by menu items")
            } else {
                e.into()
            }
        })?;
        if affected == 0 {
            return Err(Error::NotFound);
        }

        Ok(())
    }
}

pub struct CatalogServiceMemory {
    inner: MemoryStore,
}

impl CatalogServiceMemory {
    pub fn new(inner: MemoryStore) -> Self {
        Self { inner }
    }
}

#[async_trait]
impl CatalogService for CatalogServiceMemory {
    async fn list_menu_items(&self, query: MenuItemQuery) -> ServiceResult<Page<MenuItem>> {
        let state = memory::lock(&self.inner);

        let mut items: Vec<MenuItem> = state
            .menu_items
            .keys()
            .filter_map(|id| state.menu_item(*id))
            .filter(|item| {
                query
                    .category
                    .as_deref()
                    .map_or(true, |category| item.category.title == category)
            })
            .filter(|item| {
                query.search.as_deref().map_or(true, |search| {
                    let needle = search.to_lowercase();
                    item.title.to_lowercase().contains(&needle)
                        || item.category.title.to_lowercase().contains(&needle)
                })
            })
            .collect();

        match query.price_ordering() {
            Some(PriceOrdering::Ascending) => items.sort_by(|a, b| a.price.cmp(&b.price)),
            Some(PriceOrdering::Descending) => items.sort_by(|a, b| b.price.cmp(&a.price)),
            None => {}
        }

        Ok(query.page_params().apply(items))
    }

    async fn get_menu_item(&self, id: MenuItemId) -> ServiceResult<MenuItem> {
        let state = memory::lock(&self.inner);

        state.menu_item(id).ok_or(Error::NotFound)
    }

    async fn create_menu_item(&self, data: NewMenuItem) -> ServiceResult<MenuItem> {
        data.validate()?;
        let mut state = memory::lock(&self.inner);

        if !state.categories.contains_key(&data.category_id) {
            return Err(Error::validation("Category does not exist"));
        }
        let id = MenuItemId(state.next_id());
        state.menu_items.insert(
            id,
            StoredMenuItem {
                id,
                title: data.title,
                price: data.price,
                featured: data.featured,
                category_id: data.category_id,
            },
        );

        state.menu_item(id).ok_or(Error::NotFound)
    }

    async fn replace_menu_item(&self, id: MenuItemId, data: NewMenuItem) -> ServiceResult<MenuItem> {
        data.validate()?;
        let mut state = memory::lock(&self.inner);

        if !state.menu_items.contains_key(&id) {
            return Err(Error::NotFound);
        }
        if !state.categories.contains_key(&data.category_id) {
            return Err(Error::validation("Category does not exist"));
        }
        state.menu_items.insert(
            id,
            StoredMenuItem {
                id,
                title: data.title,
                price: data.price,
                featured: data.featured,
                category_id: data.category_id,
            },
        );

        state.menu_item(id).ok_or(Error::NotFound)
    }

    async fn update_menu_item(&self, id: MenuItemId, data: MenuItemUpdate) -> ServiceResult<MenuItem> {
        data.validate()?;
        let mut state = memory::lock(&self.inner);

        if let Some(category_id) = data.category_id {
            if !state.categories.contains_key(&category_id) {
                return Err(Error::validation("Category does not exist"));
            }
        }
        let stored = state.menu_items.get_mut(&id).ok_or(Error::NotFound)?;
        if let Some(title) = data.title {
            stored.title = title;
        }
        if let Some(price) = data.price {
            stored.price = price;
        }
        if let Some(featured) = data.featured {
            stored.featured = featured;
        }
        if let Some(category_id) = data.category_id {
            stored.category_id = category_id;
        }

        state.menu_item(id).ok_or(Error::NotFound)
    }

    async fn delete_menu_item(&self, id: MenuItemId) -> ServiceResult<()> {
        let mut state = memory::lock(&self.inner);

        state.menu_items.remove(&id).ok_or(Error::NotFound)?;

        Ok(())
    }

    async fn list_categories(&self) -> ServiceResult<Vec<Category>> {
        let state = memory::lock(&self.inner);

        Ok(state.categories.values().cloned().collect())
    }

    async fn create_category(&self, data: NewCategory) -> ServiceResult<Category> {
        data.validate()?;
        let mut state = memory::lock(&self.inner);

        if state.categories.values().any(|c| c.slug == data.slug) {
            return Err(Error::validation("Category with this slug already exists"));
        }
        let id = CategoryId(state.next_id());
        let category = Category {
            id,
            slug: data.slug,
            title: data.title,
        };
        state.categories.insert(id, category.clone());

        Ok(category)
    }

    async fn delete_category(&self, id: CategoryId) -> ServiceResult<()> {
        let mut state = memory::lock(&self.inner);

        if !state.categories.contains_key(&id) {
            return Err(Error::NotFound);
        }
        if state.menu_items.values().any(|item| item.category_id == id) {
            return Err(Error::validation("Category is referenced by menu items"));
        }
        state.categories.remove(&id);

        Ok(())
    }
}
