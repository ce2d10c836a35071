//! Generic CRUD repository over one REST collection.

use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fmt;
use std::marker::PhantomData;

use crate::error::ApiResult;
use crate::http::{ApiClient, ApiRequest};
use crate::resources::query::{ListQuery, Page};

/// Admin-managed collections.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResourceKind {
    Users,
    Categories,
    Products,
    ProductEntries,
    StoreBrands,
    StoreLocations,
}

impl ResourceKind {
    pub const ALL: [ResourceKind; 6] = [
        ResourceKind::Users,
        ResourceKind::Categories,
        ResourceKind::Products,
        ResourceKind::ProductEntries,
        ResourceKind::StoreBrands,
        ResourceKind::StoreLocations,
    ];

    /// Collection path relative to the API base URL.
    pub fn path(self) -> &'static str {
        match self {
            ResourceKind::Users => "users",
            ResourceKind::Categories => "categories",
            ResourceKind::Products => "products",
            ResourceKind::ProductEntries => "product-entries",
            ResourceKind::StoreBrands => "store-brands",
            ResourceKind::StoreLocations => "store-locations",
        }
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.path())
    }
}

/// CRUD access to one collection.
pub struct Repository<T = serde_json::Value> {
    client: ApiClient,
    kind: ResourceKind,
    _model: PhantomData<fn() -> T>,
}

impl<T> Clone for Repository<T> {
    fn clone(&self) -> Self {
        Self {
            client: self.client.clone(),
            kind: self.kind,
            _model: PhantomData,
        }
    }
}

impl<T: DeserializeOwned> Repository<T> {
    pub fn new(client: ApiClient, kind: ResourceKind) -> Self {
        Self {
            client,
            kind,
            _model: PhantomData,
        }
    }

    pub fn kind(&self) -> ResourceKind {
        self.kind
    }

    fn item_path(&self, id: &impl fmt::Display) -> String {
        format!("{}/{}", self.kind.path(), id)
    }

    /// `GET collection` with search, pagination and ordering.
    pub async fn list(&self, query: &ListQuery) -> ApiResult<Page<T>> {
        let request = query.apply(ApiRequest::get(self.kind.path()));
        self.client.json(request).await
    }

    /// `GET collection/:id`.
    pub async fn get(&self, id: impl fmt::Display) -> ApiResult<T> {
        self.client.json(ApiRequest::get(self.item_path(&id))).await
    }

    /// `POST collection`.
    pub async fn create<B: Serialize + ?Sized>(&self, body: &B) -> ApiResult<T> {
        let request = ApiRequest::post(self.kind.path()).json(body)?;
        self.client.json(request).await
    }

    /// `PUT collection/:id`.
    pub async fn update<B: Serialize + ?Sized>(&self, id: impl fmt::Display, body: &B) -> ApiResult<T> {
        let request = ApiRequest::put(self.item_path(&id)).json(body)?;
        self.client.json(request).await
    }

    /// `DELETE collection/:id`, expecting `204 No Content`.
    pub async fn delete(&self, id: impl fmt::Display) -> ApiResult<()> {
        self.client
            .send_empty(ApiRequest::delete(self.item_path(&id)))
            .await
    }
}
