use std::collections::{BTreeMap, BTreeSet};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use rigstock_auth::{NewUser, User, UserStatus};
use rigstock_core::{ArticleId, ReportId, UserId};
use rigstock_inventory::{Article, NewArticle, SuggestionField};
use rigstock_reports::{NewReport, Report, ReportStatus, ReportType};

use super::{ArticleStore, ReportStore, StoreHealth, UserFilter, UserStore};
use crate::{StoreError, StoreResult};

#[derive(Debug, Default)]
struct State {
    articles: BTreeMap<ArticleId, Article>,
    users: BTreeMap<UserId, User>,
    reports: BTreeMap<ReportId, Report>,
    last_article_id: i64,
    last_user_id: i64,
    last_report_id: i64,
}

/// Process-local store for development and tests.
///
/// All three collections sit behind one lock, so every write (including the
/// article → reports cascade) is atomic. Ids start at 1 and are never reused.
#[derive(Debug, Default)]
pub struct InMemoryStore {
    inner: RwLock<State>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> StoreResult<RwLockReadGuard<'_, State>> {
        self.inner
            .read()
            .map_err(|_| StoreError::Unavailable("in-memory store lock poisoned".into()))
    }

    fn write(&self) -> StoreResult<RwLockWriteGuard<'_, State>> {
        self.inner
            .write()
            .map_err(|_| StoreError::Unavailable("in-memory store lock poisoned".into()))
    }
}

fn newest_first<T>(items: &mut [T], created_at: impl Fn(&T) -> (DateTime<Utc>, i64)) {
    items.sort_by(|a, b| created_at(b).cmp(&created_at(a)));
}

#[async_trait]
impl ArticleStore for InMemoryStore {
    async fn list_articles(&self) -> StoreResult<Vec<Article>> {
        Ok(self.read()?.articles.values().cloned().collect())
    }

    async fn get_article(&self, id: ArticleId) -> StoreResult<Option<Article>> {
        Ok(self.read()?.articles.get(&id).cloned())
    }

    async fn find_article_by_code(&self, code: &str) -> StoreResult<Option<Article>> {
        Ok(self.read()?.articles.values().find(|a| a.code == code).cloned())
    }

    async fn find_article_by_name(
        &self,
        name: &str,
        exclude: Option<ArticleId>,
    ) -> StoreResult<Option<Article>> {
        let needle = name.to_lowercase();
        Ok(self
            .read()?
            .articles
            .values()
            .filter(|a| Some(a.id) != exclude)
            .find(|a| a.name.to_lowercase() == needle)
            .cloned())
    }

    async fn insert_article(&self, new: NewArticle, now: DateTime<Utc>) -> StoreResult<Article> {
        let mut state = self.write()?;
        if state.articles.values().any(|a| a.code == new.code) {
            return Err(StoreError::Duplicate("article code already exists".into()));
        }
        state.last_article_id += 1;
        let article = Article {
            id: ArticleId::new(state.last_article_id),
            code: new.code,
            name: new.name,
            description: new.description,
            tipo: new.tipo,
            category: new.category,
            unit: new.unit,
            stock_min: new.stock_min,
            stock_current: new.stock_current,
            location: new.location,
            status: new.status,
            acquisition_date: new.acquisition_date,
            observations: new.observations,
            created_at: now,
            updated_at: now,
        };
        state.articles.insert(article.id, article.clone());
        Ok(article)
    }

    async fn update_article(&self, article: &Article) -> StoreResult<bool> {
        let mut state = self.write()?;
        if state
            .articles
            .values()
            .any(|a| a.code == article.code && a.id != article.id)
        {
            return Err(StoreError::Duplicate("article code already exists".into()));
        }
        match state.articles.get_mut(&article.id) {
            Some(slot) => {
                *slot = article.clone();
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn delete_article(&self, id: ArticleId) -> StoreResult<bool> {
        let mut state = self.write()?;
        if state.articles.remove(&id).is_none() {
            return Ok(false);
        }
        state.reports.retain(|_, r| r.article_id != id);
        Ok(true)
    }

    async fn suggest(&self, field: SuggestionField, query: &str, limit: usize) -> StoreResult<Vec<String>> {
        let needle = query.to_lowercase();
        let state = self.read()?;
        let values: BTreeSet<&str> = state
            .articles
            .values()
            .filter_map(|a| a.field(field))
            .filter(|v| !v.is_empty() && v.to_lowercase().contains(&needle))
            .collect();
        Ok(values.into_iter().take(limit).map(str::to_string).collect())
    }

    async fn count_articles(&self) -> StoreResult<u64> {
        Ok(self.read()?.articles.len() as u64)
    }
}

#[async_trait]
impl UserStore for InMemoryStore {
    async fn list_users(&self, filter: &UserFilter) -> StoreResult<Vec<User>> {
        let mut users: Vec<User> = self
            .read()?
            .users
            .values()
            .filter(|u| filter.matches(u))
            .cloned()
            .collect();
        newest_first(&mut users, |u| (u.created_at, u.id.get()));
        Ok(users)
    }

    async fn get_user(&self, id: UserId) -> StoreResult<Option<User>> {
        Ok(self.read()?.users.get(&id).cloned())
    }

    async fn find_user_by_username(&self, username: &str) -> StoreResult<Option<User>> {
        Ok(self.read()?.users.values().find(|u| u.username == username).cloned())
    }

    async fn find_user_by_email(&self, email: &str) -> StoreResult<Option<User>> {
        Ok(self.read()?.users.values().find(|u| u.email == email).cloned())
    }

    async fn insert_user(&self, new: NewUser, now: DateTime<Utc>) -> StoreResult<User> {
        let mut state = self.write()?;
        if state.users.values().any(|u| u.username == new.username) {
            return Err(StoreError::Duplicate("username already exists".into()));
        }
        if state.users.values().any(|u| u.email == new.email) {
            return Err(StoreError::Duplicate("email is already registered".into()));
        }
        state.last_user_id += 1;
        let user = User {
            id: UserId::new(state.last_user_id),
            username: new.username,
            email: new.email,
            password_hash: new.password_hash,
            full_name: new.full_name,
            role: new.role,
            status: new.status,
            last_login: None,
            created_at: now,
        };
        state.users.insert(user.id, user.clone());
        Ok(user)
    }

    async fn update_user(&self, user: &User) -> StoreResult<bool> {
        let mut state = self.write()?;
        let taken = |pred: &dyn Fn(&User) -> bool| {
            state.users.values().any(|u| u.id != user.id && pred(u))
        };
        if taken(&|u| u.username == user.username) {
            return Err(StoreError::Duplicate("username already exists".into()));
        }
        if taken(&|u| u.email == user.email) {
            return Err(StoreError::Duplicate("email is already registered".into()));
        }
        match state.users.get_mut(&user.id) {
            Some(slot) => {
                let last_login = slot.last_login;
                *slot = User {
                    last_login,
                    ..user.clone()
                };
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn touch_last_login(&self, id: UserId, at: DateTime<Utc>) -> StoreResult<()> {
        if let Some(user) = self.write()?.users.get_mut(&id) {
            user.last_login = Some(at);
        }
        Ok(())
    }

    async fn count_users(&self) -> StoreResult<u64> {
        Ok(self.read()?.users.len() as u64)
    }

    async fn count_active_users(&self) -> StoreResult<u64> {
        Ok(self
            .read()?
            .users
            .values()
            .filter(|u| u.status == UserStatus::Active)
            .count() as u64)
    }
}

#[async_trait]
impl ReportStore for InMemoryStore {
    async fn list_reports(&self, status: Option<ReportStatus>) -> StoreResult<Vec<Report>> {
        let mut reports: Vec<Report> = self
            .read()?
            .reports
            .values()
            .filter(|r| status.is_none_or(|s| r.status == s))
            .cloned()
            .collect();
        newest_first(&mut reports, |r| (r.created_at, r.id.get()));
        Ok(reports)
    }

    async fn list_reports_by_user(&self, user_id: UserId) -> StoreResult<Vec<Report>> {
        let mut reports: Vec<Report> = self
            .read()?
            .reports
            .values()
            .filter(|r| r.user_id == user_id)
            .cloned()
            .collect();
        newest_first(&mut reports, |r| (r.created_at, r.id.get()));
        Ok(reports)
    }

    async fn get_report(&self, id: ReportId) -> StoreResult<Option<Report>> {
        Ok(self.read()?.reports.get(&id).cloned())
    }

    async fn insert_report(&self, new: NewReport, now: DateTime<Utc>) -> StoreResult<Report> {
        let mut state = self.write()?;
        if !state.articles.contains_key(&new.article_id) {
            return Err(StoreError::backend(
                "insert_report",
                format!("article {} does not exist", new.article_id),
            ));
        }
        state.last_report_id += 1;
        let report = Report {
            id: ReportId::new(state.last_report_id),
            article_id: new.article_id,
            user_id: new.user_id,
            report_type: new.report_type,
            message: new.message,
            status: new.status,
            admin_response: None,
            created_at: now,
            updated_at: None,
        };
        state.reports.insert(report.id, report.clone());
        Ok(report)
    }

    async fn update_report(&self, report: &Report) -> StoreResult<bool> {
        match self.write()?.reports.get_mut(&report.id) {
            Some(slot) => {
                *slot = report.clone();
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn delete_report(&self, id: ReportId) -> StoreResult<bool> {
        Ok(self.write()?.reports.remove(&id).is_some())
    }

    async fn count_reports(&self) -> StoreResult<u64> {
        Ok(self.read()?.reports.len() as u64)
    }

    async fn count_reports_since(&self, since: DateTime<Utc>) -> StoreResult<u64> {
        Ok(self
            .read()?
            .reports
            .values()
            .filter(|r| r.created_at >= since)
            .count() as u64)
    }

    async fn report_groups(&self) -> StoreResult<Vec<(ReportStatus, ReportType, u64)>> {
        let mut groups: BTreeMap<(ReportStatus, ReportType), u64> = BTreeMap::new();
        for report in self.read()?.reports.values() {
            *groups.entry((report.status, report.report_type)).or_default() += 1;
        }
        Ok(groups.into_iter().map(|((s, t), n)| (s, t, n)).collect())
    }
}

#[async_trait]
impl StoreHealth for InMemoryStore {
    async fn ping(&self) -> StoreResult<()> {
        self.read().map(|_| ())
    }

    fn backend(&self) -> &'static str {
        "in-memory"
    }
}

#[cfg(test)]
mod tests {
    use chrono::Duration;
    use rigstock_auth::Role;
    use rigstock_inventory::CreateArticle;
    use rigstock_reports::CreateReport;

    use super::*;

    fn article(code: &str, name: &str, tipo: Option<&str>) -> NewArticle {
        CreateArticle {
            code: Some(code.into()),
            name: Some(name.into()),
            tipo: tipo.map(str::to_string),
            ..Default::default()
        }
        .validate()
        .unwrap()
    }

    fn operator(username: &str) -> NewUser {
        NewUser {
            username: username.into(),
            email: format!("{username}@field.example"),
            password_hash: "hash".into(),
            full_name: "Field Operator".into(),
            role: Role::User,
            status: UserStatus::Active,
        }
    }

    fn report(article_id: ArticleId, user_id: UserId, kind: &str) -> NewReport {
        CreateReport {
            article_id: Some(article_id.get()),
            report_type: Some(kind.into()),
            message: Some("leaking seal".into()),
        }
        .validate(user_id)
        .unwrap()
    }

    #[tokio::test]
    async fn ids_start_at_one() {
        let store = InMemoryStore::new();
        let now = Utc::now();
        let first = store.insert_user(operator("admin"), now).await.unwrap();
        let second = store.insert_user(operator("juan"), now).await.unwrap();
        assert!(first.id.is_primary_admin());
        assert_eq!(second.id, UserId::new(2));
    }

    #[tokio::test]
    async fn duplicate_code_is_rejected() {
        let store = InMemoryStore::new();
        let now = Utc::now();
        store.insert_article(article("P-01", "Pump", None), now).await.unwrap();
        let err = store
            .insert_article(article("p-01", "Other", None), now)
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Duplicate(_)));
    }

    #[tokio::test]
    async fn update_cannot_steal_another_code() {
        let store = InMemoryStore::new();
        let now = Utc::now();
        store.insert_article(article("AAA-1", "First", None), now).await.unwrap();
        let mut second = store.insert_article(article("BBB-1", "Second", None), now).await.unwrap();
        second.code = "AAA-1".into();
        assert!(matches!(
            store.update_article(&second).await,
            Err(StoreError::Duplicate(_))
        ));
    }

    #[tokio::test]
    async fn name_lookup_is_case_insensitive_and_honours_exclusion() {
        let store = InMemoryStore::new();
        let saved = store
            .insert_article(article("TL-1", "Llave Inglesa", Some("herramienta")), Utc::now())
            .await
            .unwrap();
        assert!(store.find_article_by_name("LLAVE INGLESA", None).await.unwrap().is_some());
        assert!(store
            .find_article_by_name("llave inglesa", Some(saved.id))
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn deleting_an_article_cascades_to_reports() {
        let store = InMemoryStore::new();
        let now = Utc::now();
        let user = store.insert_user(operator("juan"), now).await.unwrap();
        let a = store.insert_article(article("P-01", "Pump", None), now).await.unwrap();
        let b = store.insert_article(article("P-02", "Pump Two", None), now).await.unwrap();
        store.insert_report(report(a.id, user.id, "FALLA"), now).await.unwrap();
        store.insert_report(report(b.id, user.id, "FALLA"), now).await.unwrap();

        assert!(store.delete_article(a.id).await.unwrap());
        assert_eq!(store.count_reports().await.unwrap(), 1);
        assert!(!store.delete_article(a.id).await.unwrap());
    }

    #[tokio::test]
    async fn suggestions_are_distinct_and_capped() {
        let store = InMemoryStore::new();
        let now = Utc::now();
        for i in 0..15 {
            let mut new = article(&format!("C-{i:02}"), &format!("Compresor {i:02}"), None);
            new.location = Some("Bodega Norte".into());
            store.insert_article(new, now).await.unwrap();
        }
        let names = store.suggest(SuggestionField::Name, "COMP", 10).await.unwrap();
        assert_eq!(names.len(), 10);
        let locations = store.suggest(SuggestionField::Location, "norte", 10).await.unwrap();
        assert_eq!(locations, vec!["Bodega Norte".to_string()]);
    }

    #[tokio::test]
    async fn reports_list_newest_first_and_filter_by_status() {
        let store = InMemoryStore::new();
        let t0 = Utc::now();
        let user = store.insert_user(operator("juan"), t0).await.unwrap();
        let a = store.insert_article(article("P-01", "Pump", None), t0).await.unwrap();
        let old = store.insert_report(report(a.id, user.id, "FALLA"), t0).await.unwrap();
        let new = store
            .insert_report(report(a.id, user.id, "SOLICITUD"), t0 + Duration::minutes(5))
            .await
            .unwrap();

        let all = store.list_reports(None).await.unwrap();
        assert_eq!(all.iter().map(|r| r.id).collect::<Vec<_>>(), vec![new.id, old.id]);

        let mut resolved = old.clone();
        resolved.status = ReportStatus::Resuelto;
        store.update_report(&resolved).await.unwrap();
        let only = store.list_reports(Some(ReportStatus::Resuelto)).await.unwrap();
        assert_eq!(only.len(), 1);
        assert_eq!(only[0].id, old.id);

        assert_eq!(store.count_reports_since(t0 + Duration::minutes(1)).await.unwrap(), 1);
        let groups = store.report_groups().await.unwrap();
        assert_eq!(groups.len(), 2);
    }

    #[tokio::test]
    async fn user_uniqueness_on_update_excludes_self() {
        let store = InMemoryStore::new();
        let now = Utc::now();
        store.insert_user(operator("ana"), now).await.unwrap();
        let mut juan = store.insert_user(operator("juan"), now).await.unwrap();

        juan.full_name = "Juan Perez".into();
        assert!(store.update_user(&juan).await.unwrap());

        juan.email = "ana@field.example".into();
        assert!(matches!(store.update_user(&juan).await, Err(StoreError::Duplicate(_))));
    }

    #[tokio::test]
    async fn update_keeps_a_login_recorded_after_the_read() {
        let store = InMemoryStore::new();
        let now = Utc::now();
        let mut snapshot = store.insert_user(operator("juan"), now).await.unwrap();
        assert_eq!(snapshot.last_login, None);

        let login_at = now + Duration::seconds(5);
        store.touch_last_login(snapshot.id, login_at).await.unwrap();

        snapshot.full_name = "Juan Perez".into();
        assert!(store.update_user(&snapshot).await.unwrap());

        let stored = store.get_user(snapshot.id).await.unwrap().unwrap();
        assert_eq!(stored.full_name, "Juan Perez");
        assert_eq!(stored.last_login, Some(login_at));
    }
}
