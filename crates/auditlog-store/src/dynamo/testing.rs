// ABOUTME: In-memory stand-in for the DynamoDB table service used by repository tests.
// ABOUTME: Records calls, scripts table states, injects failures, and pages query results.

use std::collections::{BTreeMap, HashMap, VecDeque};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use aws_sdk_dynamodb::types::AttributeValue;

use super::client::{
    ClientError, Item, QueryPage, QueryRequest, TableClient, TableCreation, TableSchema, TableState,
};
use super::{ATTR_DATE, ATTR_ID, ATTR_STATUS_CODE};

#[derive(Default)]
struct FakeState {
    calls: Vec<&'static str>,
    failures: HashMap<&'static str, String>,
    nth_failures: HashMap<&'static str, (usize, String)>,
    schema: Option<TableSchema>,
    creations: Vec<TableCreation>,
    states: VecDeque<TableState>,
    ttl_attribute: Option<String>,
    items: BTreeMap<String, Item>,
    page_size: Option<usize>,
    last_query: Option<QueryRequest>,
}

pub struct FakeTableClient {
    state: Mutex<FakeState>,
}

impl FakeTableClient {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            state: Mutex::new(FakeState::default()),
        })
    }

    /// Make `operation` fail with `message` from now on.
    pub fn fail(&self, operation: &'static str, message: &str) {
        self.state
            .lock()
            .unwrap()
            .failures
            .insert(operation, message.to_string());
    }

    /// Make only the `n`th call (counting from 1) to `operation` fail.
    pub fn fail_nth(&self, operation: &'static str, n: usize, message: &str) {
        self.state
            .lock()
            .unwrap()
            .nth_failures
            .insert(operation, (n, message.to_string()));
    }

    /// States returned by successive describe calls before the table reports active.
    pub fn script_states(&self, states: impl IntoIterator<Item = TableState>) {
        self.state.lock().unwrap().states.extend(states);
    }

    pub fn set_page_size(&self, size: usize) {
        self.state.lock().unwrap().page_size = Some(size);
    }

    pub fn insert_raw(&self, item: Item) {
        let id = match item.get(ATTR_ID) {
            Some(AttributeValue::S(id)) => id.clone(),
            _ => panic!("raw item needs a string id"),
        };
        self.state.lock().unwrap().items.insert(id, item);
    }

    pub fn calls(&self) -> Vec<&'static str> {
        self.state.lock().unwrap().calls.clone()
    }

    pub fn created_schema(&self) -> Option<TableSchema> {
        self.state.lock().unwrap().schema.clone()
    }

    pub fn creations(&self) -> Vec<TableCreation> {
        self.state.lock().unwrap().creations.clone()
    }

    pub fn ttl_attribute(&self) -> Option<String> {
        self.state.lock().unwrap().ttl_attribute.clone()
    }

    pub fn item(&self, id: &str) -> Option<Item> {
        self.state.lock().unwrap().items.get(id).cloned()
    }

    pub fn last_query(&self) -> Option<QueryRequest> {
        self.state.lock().unwrap().last_query.clone()
    }

    fn enter(&self, operation: &'static str) -> Result<std::sync::MutexGuard<'_, FakeState>, ClientError> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(operation);
        let seen = state.calls.iter().filter(|c| **c == operation).count();
        let due = state
            .nth_failures
            .get(operation)
            .is_some_and(|(n, _)| *n == seen);
        let one_shot = if due {
            state.nth_failures.remove(operation).map(|(_, message)| message)
        } else {
            None
        };
        let failure = one_shot.or_else(|| state.failures.get(operation).cloned());
        match failure {
            Some(message) => Err(ClientError::new(operation, message)),
            None => Ok(state),
        }
    }
}

fn id_of(key: &Item) -> String {
    match key.get(ATTR_ID) {
        Some(AttributeValue::S(id)) => id.clone(),
        _ => String::new(),
    }
}

fn matches_query(item: &Item, request: &QueryRequest) -> bool {
    let status = match item.get(ATTR_STATUS_CODE) {
        Some(AttributeValue::N(n)) => n.parse::<i64>().ok(),
        _ => None,
    };
    let date = match item.get(ATTR_DATE) {
        Some(AttributeValue::S(s)) => s.as_str(),
        _ => return false,
    };
    status == Some(request.status_code)
        && date >= request.from.as_str()
        && date <= request.to.as_str()
}

#[async_trait]
impl TableClient for FakeTableClient {
    async fn create_table(&self, schema: &TableSchema) -> Result<TableCreation, ClientError> {
        let mut state = self.enter("create_table")?;
        let creation = if state.schema.is_some() {
            TableCreation::AlreadyExists
        } else {
            state.schema = Some(schema.clone());
            TableCreation::Created
        };
        state.creations.push(creation);
        Ok(creation)
    }

    async fn describe_table(&self, _table: &str) -> Result<TableState, ClientError> {
        let mut state = self.enter("describe_table")?;
        Ok(state.states.pop_front().unwrap_or(TableState::Active))
    }

    async fn enable_ttl(&self, _table: &str, attribute: &str) -> Result<(), ClientError> {
        let mut state = self.enter("enable_ttl")?;
        state.ttl_attribute = Some(attribute.to_string());
        Ok(())
    }

    async fn put_item(&self, _table: &str, item: Item) -> Result<(), ClientError> {
        let mut state = self.enter("put_item")?;
        state.items.insert(id_of(&item), item);
        Ok(())
    }

    async fn get_item(&self, _table: &str, key: Item) -> Result<Option<Item>, ClientError> {
        let state = self.enter("get_item")?;
        Ok(state.items.get(&id_of(&key)).cloned())
    }

    async fn delete_item(&self, _table: &str, key: Item) -> Result<Option<Item>, ClientError> {
        let mut state = self.enter("delete_item")?;
        Ok(state.items.remove(&id_of(&key)))
    }

    async fn query(&self, request: QueryRequest) -> Result<QueryPage, ClientError> {
        let mut state = self.enter("query")?;
        let after = request.exclusive_start_key.as_ref().map(id_of);
        let page_size = state.page_size.unwrap_or(usize::MAX);

        let matching: Vec<(&String, &Item)> = state
            .items
            .iter()
            .filter(|(id, _)| after.as_ref().is_none_or(|after| *id > after))
            .filter(|(_, item)| matches_query(item, &request))
            .collect();

        let more = matching.len() > page_size;
        let page: Vec<(&String, &Item)> = matching.into_iter().take(page_size).collect();
        let last_evaluated_key = match (more, page.last()) {
            (true, Some((id, _))) => Some(HashMap::from([(
                ATTR_ID.to_string(),
                AttributeValue::S((*id).clone()),
            )])),
            _ => None,
        };
        let items = page.into_iter().map(|(_, item)| item.clone()).collect();

        state.last_query = Some(request);
        Ok(QueryPage {
            items,
            last_evaluated_key,
        })
    }
}
