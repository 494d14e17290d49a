//! In-process store. State lives behind one `RwLock`, so every trait call is atomic.

use super::*;
use chrono::Utc;
use std::collections::{BTreeMap, HashMap};
use tokio::sync::RwLock;

#[derive(Default)]
struct Sequences {
    users: i64,
    assets: i64,
    categories: i64,
    items: i64,
    requests: i64,
    history: i64,
}

fn bump(seq: &mut i64) -> i64 {
    *seq += 1;
    *seq
}

#[derive(Default)]
struct Data {
    seq: Sequences,
    users: BTreeMap<i64, User>,
    profiles: HashMap<i64, UserProfile>,
    doctors: BTreeMap<i64, Doctor>,
    /// token digest -> user id
    tokens: HashMap<String, i64>,
    assets: BTreeMap<i64, Asset>,
    categories: BTreeMap<i64, ExamCategory>,
    items: BTreeMap<i64, ExamItem>,
    requests: BTreeMap<i64, ImagingRequest>,
    history: Vec<ImagingRequestHistory>,
}

impl Data {
    fn record(&self, id: i64) -> Option<UserRecord> {
        self.users.get(&id).map(|user| UserRecord {
            user: user.clone(),
            profile: self.profiles.get(&id).cloned(),
            doctor: self.doctors.get(&id).cloned(),
        })
    }

    fn check_license(&self, user_id: i64, fields: &DoctorFields) -> StoreResult<()> {
        if let Some(license) = fields.medical_license.as_deref() {
            let taken = self
                .doctors
                .values()
                .any(|d| d.user != user_id && d.fields.medical_license.as_deref() == Some(license));
            if taken {
                return Err(conflict::medical_license());
            }
        }
        Ok(())
    }

    fn remove_doctor(&mut self, user_id: i64) -> bool {
        if self.doctors.remove(&user_id).is_none() {
            return false;
        }
        for request in self.requests.values_mut() {
            if request.fields.doctor == Some(user_id) {
                request.fields.doctor = None;
            }
        }
        true
    }

    fn unlink_items(&mut self, item_ids: &[i64]) {
        for request in self.requests.values_mut() {
            request.selected_exams.retain(|id| !item_ids.contains(id));
        }
    }

    fn check_request_refs(&self, fields: &ImagingRequestFields, exams: Option<&[i64]>) -> StoreResult<()> {
        if let Some(doctor) = fields.doctor {
            if !self.doctors.contains_key(&doctor) {
                return Err(conflict::missing("doctor", doctor));
            }
        }
        for id in exams.unwrap_or(&[]) {
            if !self.items.contains_key(id) {
                return Err(conflict::missing("selected_exams", *id));
            }
        }
        Ok(())
    }

    fn push_history(&mut self, request: &ImagingRequest, kind: HistoryType, actor: Option<i64>) {
        let history_id = bump(&mut self.seq.history);
        self.history.push(ImagingRequestHistory {
            history_id,
            request_id: request.id,
            history_type: kind,
            history_date: Utc::now(),
            history_user_id: actor,
            snapshot: request_snapshot(request),
        });
    }
}

fn normalized_exams(exams: &[i64]) -> Vec<i64> {
    let mut out = exams.to_vec();
    out.sort_unstable();
    out.dedup();
    out
}

fn asset_matches(asset: &Asset, query: &AssetQuery) -> bool {
    let f = &asset.fields;
    if query.asset_type.is_some_and(|t| t != f.asset_type) {
        return false;
    }
    if query.status.as_deref().is_some_and(|s| s != f.status) {
        return false;
    }
    if query.connectivity.is_some_and(|c| c != f.connectivity) {
        return false;
    }
    if query.antivirus_enabled.is_some_and(|a| a != f.antivirus_enabled) {
        return false;
    }
    let haystack = f.searchable();
    query.search_terms.iter().all(|term| {
        let term = term.to_lowercase();
        haystack
            .iter()
            .flatten()
            .any(|value| value.to_lowercase().contains(&term))
    })
}

#[derive(Default)]
pub struct MemoryStore {
    data: RwLock<Data>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl AssetStore for MemoryStore {
    async fn list_assets(&self, query: &AssetQuery) -> StoreResult<Vec<Asset>> {
        let data = self.data.read().await;
        let mut out: Vec<Asset> = data
            .assets
            .values()
            .filter(|a| asset_matches(a, query))
            .cloned()
            .collect();
        out.sort_by(|a, b| a.fields.name.cmp(&b.fields.name).then_with(|| a.id.cmp(&b.id)));
        Ok(out
            .into_iter()
            .skip(query.offset as usize)
            .take(query.limit as usize)
            .collect())
    }

    async fn get_asset(&self, id: i64) -> StoreResult<Option<Asset>> {
        Ok(self.data.read().await.assets.get(&id).cloned())
    }

    async fn create_asset(&self, fields: &AssetFields) -> StoreResult<Asset> {
        let mut data = self.data.write().await;
        if data.assets.values().any(|a| a.fields.asset_id == fields.asset_id) {
            return Err(conflict::asset_id());
        }
        let id = bump(&mut data.seq.assets);
        let asset = Asset { id, fields: fields.clone() };
        data.assets.insert(id, asset.clone());
        Ok(asset)
    }

    async fn update_asset(&self, id: i64, fields: &AssetFields) -> StoreResult<Option<Asset>> {
        let mut data = self.data.write().await;
        if !data.assets.contains_key(&id) {
            return Ok(None);
        }
        if data
            .assets
            .values()
            .any(|a| a.id != id && a.fields.asset_id == fields.asset_id)
        {
            return Err(conflict::asset_id());
        }
        let asset = Asset { id, fields: fields.clone() };
        data.assets.insert(id, asset.clone());
        Ok(Some(asset))
    }

    async fn delete_asset(&self, id: i64) -> StoreResult<bool> {
        Ok(self.data.write().await.assets.remove(&id).is_some())
    }
}

#[async_trait]
impl UserStore for MemoryStore {
    async fn list_users(&self) -> StoreResult<Vec<UserRecord>> {
        let data = self.data.read().await;
        let mut out: Vec<UserRecord> = data.users.keys().filter_map(|id| data.record(*id)).collect();
        out.sort_by(|a, b| a.user.username.cmp(&b.user.username));
        Ok(out)
    }

    async fn get_user(&self, id: i64) -> StoreResult<Option<UserRecord>> {
        Ok(self.data.read().await.record(id))
    }

    async fn find_user_by_username(&self, username: &str) -> StoreResult<Option<User>> {
        let data = self.data.read().await;
        Ok(data.users.values().find(|u| u.username == username).cloned())
    }

    async fn create_user(
        &self,
        user: &NewUser,
        profile: Option<&ProfileFields>,
        doctor: Option<&DoctorFields>,
    ) -> StoreResult<UserRecord> {
        let mut data = self.data.write().await;
        if data.users.values().any(|u| u.username == user.username) {
            return Err(conflict::username());
        }
        if let Some(fields) = doctor {
            data.check_license(0, fields)?;
        }
        let id = bump(&mut data.seq.users);
        data.users.insert(
            id,
            User {
                id,
                username: user.username.clone(),
                email: user.email.clone(),
                password_hash: user.password_hash.clone(),
                is_staff: user.is_staff,
                is_active: user.is_active,
                date_joined: Utc::now(),
            },
        );
        if let Some(fields) = profile {
            data.profiles.insert(
                id,
                UserProfile { user_id: id, fields: fields.clone(), last_login_at: None },
            );
        }
        if let Some(fields) = doctor {
            data.doctors.insert(id, Doctor { user: id, fields: fields.clone() });
        }
        data.record(id).ok_or_else(|| AppError::NotFound(id.to_string()))
    }

    async fn update_user(
        &self,
        id: i64,
        changes: &UserChanges,
        profile: &SubRecord<ProfileFields>,
        doctor: &SubRecord<DoctorFields>,
    ) -> StoreResult<Option<UserRecord>> {
        let mut data = self.data.write().await;
        if !data.users.contains_key(&id) {
            return Ok(None);
        }
        if data
            .users
            .values()
            .any(|u| u.id != id && u.username == changes.username)
        {
            return Err(conflict::username());
        }
        if let SubRecord::Upsert(fields) = doctor {
            data.check_license(id, fields)?;
        }

        if let Some(user) = data.users.get_mut(&id) {
            user.username = changes.username.clone();
            user.email = changes.email.clone();
            user.is_staff = changes.is_staff;
            user.is_active = changes.is_active;
            if let Some(hash) = &changes.password_hash {
                user.password_hash = Some(hash.clone());
            }
        }
        match profile {
            SubRecord::Keep => {}
            SubRecord::Upsert(fields) => {
                let entry = data.profiles.entry(id).or_insert_with(|| UserProfile {
                    user_id: id,
                    fields: ProfileFields::default(),
                    last_login_at: None,
                });
                entry.fields = fields.clone();
            }
            SubRecord::Remove => {
                data.profiles.remove(&id);
            }
        }
        match doctor {
            SubRecord::Keep => {}
            SubRecord::Upsert(fields) => {
                data.doctors.insert(id, Doctor { user: id, fields: fields.clone() });
            }
            SubRecord::Remove => {
                data.remove_doctor(id);
            }
        }
        Ok(data.record(id))
    }

    async fn delete_user(&self, id: i64) -> StoreResult<bool> {
        let mut data = self.data.write().await;
        if data.users.remove(&id).is_none() {
            return Ok(false);
        }
        data.profiles.remove(&id);
        data.remove_doctor(id);
        data.tokens.retain(|_, user_id| *user_id != id);
        Ok(true)
    }

    async fn record_login(&self, user_id: i64, at: DateTime<Utc>) -> StoreResult<()> {
        let mut data = self.data.write().await;
        if let Some(profile) = data.profiles.get_mut(&user_id) {
            profile.last_login_at = Some(at);
        }
        Ok(())
    }

    async fn list_doctors(&self) -> StoreResult<Vec<Doctor>> {
        Ok(self.data.read().await.doctors.values().cloned().collect())
    }

    async fn get_doctor(&self, user_id: i64) -> StoreResult<Option<Doctor>> {
        Ok(self.data.read().await.doctors.get(&user_id).cloned())
    }

    async fn create_doctor(&self, user_id: i64, fields: &DoctorFields) -> StoreResult<Doctor> {
        let mut data = self.data.write().await;
        if !data.users.contains_key(&user_id) {
            return Err(conflict::missing("user", user_id));
        }
        if data.doctors.contains_key(&user_id) {
            return Err(conflict::doctor_exists());
        }
        data.check_license(user_id, fields)?;
        let doctor = Doctor { user: user_id, fields: fields.clone() };
        data.doctors.insert(user_id, doctor.clone());
        Ok(doctor)
    }

    async fn update_doctor(&self, user_id: i64, fields: &DoctorFields) -> StoreResult<Option<Doctor>> {
        let mut data = self.data.write().await;
        if !data.doctors.contains_key(&user_id) {
            return Ok(None);
        }
        data.check_license(user_id, fields)?;
        let doctor = Doctor { user: user_id, fields: fields.clone() };
        data.doctors.insert(user_id, doctor.clone());
        Ok(Some(doctor))
    }

    async fn delete_doctor(&self, user_id: i64) -> StoreResult<bool> {
        Ok(self.data.write().await.remove_doctor(user_id))
    }
}

#[async_trait]
impl TokenStore for MemoryStore {
    async fn replace_token(&self, user_id: i64, digest: &str) -> StoreResult<()> {
        let mut data = self.data.write().await;
        data.tokens.retain(|_, id| *id != user_id);
        data.tokens.insert(digest.to_string(), user_id);
        Ok(())
    }

    async fn user_for_token(&self, digest: &str) -> StoreResult<Option<User>> {
        let data = self.data.read().await;
        Ok(data
            .tokens
            .get(digest)
            .and_then(|id| data.users.get(id))
            .cloned())
    }
}

#[async_trait]
impl ExamStore for MemoryStore {
    async fn list_categories(&self) -> StoreResult<Vec<ExamCategory>> {
        let mut out: Vec<ExamCategory> = self.data.read().await.categories.values().cloned().collect();
        sort_categories(&mut out);
        Ok(out)
    }

    async fn get_category(&self, id: i64) -> StoreResult<Option<ExamCategory>> {
        Ok(self.data.read().await.categories.get(&id).cloned())
    }

    async fn create_category(&self, fields: &ExamCategoryFields) -> StoreResult<ExamCategory> {
        let mut data = self.data.write().await;
        if data.categories.values().any(|c| c.name == fields.name) {
            return Err(conflict::category_name());
        }
        let id = bump(&mut data.seq.categories);
        let category = ExamCategory { id, name: fields.name.clone(), order: fields.order };
        data.categories.insert(id, category.clone());
        Ok(category)
    }

    async fn update_category(&self, id: i64, fields: &ExamCategoryFields) -> StoreResult<Option<ExamCategory>> {
        let mut data = self.data.write().await;
        if !data.categories.contains_key(&id) {
            return Ok(None);
        }
        if data.categories.values().any(|c| c.id != id && c.name == fields.name) {
            return Err(conflict::category_name());
        }
        let category = ExamCategory { id, name: fields.name.clone(), order: fields.order };
        data.categories.insert(id, category.clone());
        Ok(Some(category))
    }

    async fn delete_category(&self, id: i64) -> StoreResult<bool> {
        let mut data = self.data.write().await;
        if data.categories.remove(&id).is_none() {
            return Ok(false);
        }
        let doomed: Vec<i64> = data
            .items
            .values()
            .filter(|i| i.category == id)
            .map(|i| i.id)
            .collect();
        for item_id in &doomed {
            data.items.remove(item_id);
        }
        data.unlink_items(&doomed);
        Ok(true)
    }

    async fn upsert_category_by_name(&self, name: &str, order: i32) -> StoreResult<ExamCategory> {
        let mut data = self.data.write().await;
        if let Some(existing) = data.categories.values_mut().find(|c| c.name == name) {
            existing.order = order;
            return Ok(existing.clone());
        }
        let id = bump(&mut data.seq.categories);
        let category = ExamCategory { id, name: name.to_string(), order };
        data.categories.insert(id, category.clone());
        Ok(category)
    }

    async fn list_items(&self, category: Option<i64>) -> StoreResult<Vec<ExamItem>> {
        let mut out: Vec<ExamItem> = self
            .data
            .read()
            .await
            .items
            .values()
            .filter(|i| category.map_or(true, |c| i.category == c))
            .cloned()
            .collect();
        sort_items(&mut out);
        Ok(out)
    }

    async fn get_item(&self, id: i64) -> StoreResult<Option<ExamItem>> {
        Ok(self.data.read().await.items.get(&id).cloned())
    }

    async fn items_by_ids(&self, ids: &[i64]) -> StoreResult<Vec<ExamItem>> {
        let data = self.data.read().await;
        let mut out: Vec<ExamItem> = ids.iter().filter_map(|id| data.items.get(id)).cloned().collect();
        out.sort_by_key(|i| i.id);
        out.dedup_by_key(|i| i.id);
        Ok(out)
    }

    async fn create_item(&self, fields: &ExamItemFields) -> StoreResult<ExamItem> {
        let mut data = self.data.write().await;
        if !data.categories.contains_key(&fields.category) {
            return Err(conflict::missing("category", fields.category));
        }
        if data.items.values().any(|i| i.code == fields.code) {
            return Err(conflict::item_code());
        }
        let id = bump(&mut data.seq.items);
        let item = ExamItem {
            id,
            category: fields.category,
            name: fields.name.clone(),
            code: fields.code.clone(),
            description: fields.description.clone(),
        };
        data.items.insert(id, item.clone());
        Ok(item)
    }

    async fn update_item(&self, id: i64, fields: &ExamItemFields) -> StoreResult<Option<ExamItem>> {
        let mut data = self.data.write().await;
        if !data.items.contains_key(&id) {
            return Ok(None);
        }
        if !data.categories.contains_key(&fields.category) {
            return Err(conflict::missing("category", fields.category));
        }
        if data.items.values().any(|i| i.id != id && i.code == fields.code) {
            return Err(conflict::item_code());
        }
        let item = ExamItem {
            id,
            category: fields.category,
            name: fields.name.clone(),
            code: fields.code.clone(),
            description: fields.description.clone(),
        };
        data.items.insert(id, item.clone());
        Ok(Some(item))
    }

    async fn delete_item(&self, id: i64) -> StoreResult<bool> {
        let mut data = self.data.write().await;
        if data.items.remove(&id).is_none() {
            return Ok(false);
        }
        data.unlink_items(&[id]);
        Ok(true)
    }

    async fn upsert_item_by_code(&self, fields: &ExamItemFields) -> StoreResult<ExamItem> {
        let mut data = self.data.write().await;
        if !data.categories.contains_key(&fields.category) {
            return Err(conflict::missing("category", fields.category));
        }
        let id = match data.items.values().find(|i| i.code == fields.code) {
            Some(existing) => existing.id,
            None => bump(&mut data.seq.items),
        };
        let item = ExamItem {
            id,
            category: fields.category,
            name: fields.name.clone(),
            code: fields.code.clone(),
            description: fields.description.clone(),
        };
        data.items.insert(id, item.clone());
        Ok(item)
    }
}

#[async_trait]
impl ImagingStore for MemoryStore {
    async fn list_requests(&self, filter: &RequestFilter) -> StoreResult<Vec<ImagingRequest>> {
        let data = self.data.read().await;
        let mut out: Vec<ImagingRequest> = data
            .requests
            .values()
            .filter(|r| filter.include_deleted || !r.is_deleted)
            .filter(|r| filter.doctor.map_or(true, |d| r.fields.doctor == Some(d)))
            .cloned()
            .collect();
        sort_requests(&mut out);
        Ok(out
            .into_iter()
            .skip(filter.offset as usize)
            .take(filter.limit.map_or(usize::MAX, |n| n as usize))
            .collect())
    }

    async fn get_request(&self, id: i64) -> StoreResult<Option<ImagingRequest>> {
        Ok(self.data.read().await.requests.get(&id).cloned())
    }

    async fn create_request(
        &self,
        fields: &ImagingRequestFields,
        exams: &[i64],
        actor: Option<i64>,
    ) -> StoreResult<ImagingRequest> {
        let mut data = self.data.write().await;
        data.check_request_refs(fields, Some(exams))?;
        let id = bump(&mut data.seq.requests);
        let now = Utc::now();
        let request = ImagingRequest {
            id,
            fields: fields.clone(),
            selected_exams: normalized_exams(exams),
            is_deleted: false,
            created_at: now,
            updated_at: now,
        };
        data.requests.insert(id, request.clone());
        data.push_history(&request, HistoryType::Created, actor);
        Ok(request)
    }

    async fn update_request(
        &self,
        id: i64,
        fields: &ImagingRequestFields,
        exams: Option<&[i64]>,
        actor: Option<i64>,
    ) -> StoreResult<Option<ImagingRequest>> {
        let mut data = self.data.write().await;
        if !data.requests.contains_key(&id) {
            return Ok(None);
        }
        data.check_request_refs(fields, exams)?;
        let updated = match data.requests.get_mut(&id) {
            Some(request) => {
                request.fields = fields.clone();
                if let Some(exams) = exams {
                    request.selected_exams = normalized_exams(exams);
                }
                request.updated_at = Utc::now();
                request.clone()
            }
            None => return Ok(None),
        };
        data.push_history(&updated, HistoryType::Changed, actor);
        Ok(Some(updated))
    }

    async fn soft_delete_request(&self, id: i64, actor: Option<i64>) -> StoreResult<bool> {
        let mut data = self.data.write().await;
        let deleted = match data.requests.get_mut(&id) {
            Some(request) if !request.is_deleted => {
                request.is_deleted = true;
                request.updated_at = Utc::now();
                request.clone()
            }
            _ => return Ok(false),
        };
        data.push_history(&deleted, HistoryType::Deleted, actor);
        Ok(true)
    }

    async fn request_history(&self, id: i64) -> StoreResult<Vec<ImagingRequestHistory>> {
        let data = self.data.read().await;
        let mut out: Vec<ImagingRequestHistory> = data
            .history
            .iter()
            .filter(|h| h.request_id == id)
            .cloned()
            .collect();
        out.sort_by(|a, b| b.history_id.cmp(&a.history_id));
        Ok(out)
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn ping(&self) -> StoreResult<()> {
        Ok(())
    }
}
