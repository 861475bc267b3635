// Tab addressing for Docs edit requests.
//
// A document can hold several tabs, and each kind of edit request wants the
// target tab in a different place. There is no general rule; the table below
// lists the quirks of the remote API one request type at a time.

use serde_json::{json, Value};

const TABS_CRITERIA_METHODS: [&str; 3] =
    ["replaceNamedRangeContent", "replaceAllText", "deleteNamedRange"];

const TAB_ID_METHODS: [&str; 7] = [
    "deletePositionedObject",
    "replaceImage",
    "updateDocumentStyle",
    "deleteHeader",
    "deleteFooter",
    "location",
    "range",
];

const TAB_ID_PARAMS: [&str; 2] = ["location", "range"];

/// Where the tab id goes for a given request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TabInjection {
    /// `{method: {tabsCriteria: {tabIds: [id]}}}`
    CriteriaList,
    /// `{method: {...}, tabId: id}`
    TopLevelTabId,
    /// `{method: {location: {tabId: id}}}`
    NestedParam,
}

/// Strategy for the request's primary key (the request type).
pub fn method_injection(method: &str) -> Option<TabInjection> {
    if TABS_CRITERIA_METHODS.contains(&method) {
        Some(TabInjection::CriteriaList)
    } else if TAB_ID_METHODS.contains(&method) {
        Some(TabInjection::TopLevelTabId)
    } else {
        None
    }
}

/// Strategy for a parameter nested inside a request.
pub fn param_injection(param: &str) -> Option<TabInjection> {
    TAB_ID_PARAMS
        .contains(&param)
        .then_some(TabInjection::NestedParam)
}

/// Adds tab addressing to one request object in place. The method is the
/// request's first key in document order.
///
/// Requests with a criteria list get only that; every other request also has
/// its nested `location`/`range` parameters tagged.
pub fn add_tab_data(request: &mut Value, tab_id: &str) {
    let Some(object) = request.as_object_mut() else {
        return;
    };
    let Some(key) = object.keys().next().cloned() else {
        return;
    };

    match method_injection(&key) {
        Some(TabInjection::CriteriaList) => {
            if let Some(params) = object.get_mut(&key).and_then(Value::as_object_mut) {
                params.insert("tabsCriteria".to_string(), json!({ "tabIds": [tab_id] }));
            }
            return;
        }
        Some(TabInjection::TopLevelTabId) => {
            object.insert("tabId".to_string(), json!(tab_id));
        }
        _ => {}
    }

    if let Some(params) = object.get_mut(&key).and_then(Value::as_object_mut) {
        for (name, param) in params.iter_mut() {
            if param_injection(name).is_some() {
                if let Some(param) = param.as_object_mut() {
                    param.insert("tabId".to_string(), json!(tab_id));
                }
            }
        }
    }
}

/// Applies `add_tab_data` to every request-shaped argument of a method call:
/// object arguments, and objects inside array arguments.
pub fn add_tab_data_to_args(args: &mut [Value], tab_id: &str) {
    for arg in args.iter_mut() {
        if arg.is_object() {
            add_tab_data(arg, tab_id);
        } else if let Some(items) = arg.as_array_mut() {
            for item in items.iter_mut().filter(|i| i.is_object()) {
                add_tab_data(item, tab_id);
            }
        }
    }
}
