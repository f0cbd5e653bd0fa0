//! Domain-level constants.
//!
//! These constants define business rules and validation requirements.

// =============================================================================
// System Roles
// =============================================================================

pub const ROLE_CODE_ADMIN: &str = "ADMIN";
pub const ROLE_CODE_OWNER: &str = "OWNER";
pub const ROLE_CODE_MANAGER: &str = "MANAGER";
pub const ROLE_CODE_SALES: &str = "SALES";
pub const ROLE_CODE_PURCHASER: &str = "PURCHASER";
pub const ROLE_CODE_WAREHOUSE: &str = "WAREHOUSE";
pub const ROLE_CODE_CASHIER: &str = "CASHIER";
pub const ROLE_CODE_ACCOUNTANT: &str = "ACCOUNTANT";

/// Codes seeded as system roles for every tenant
pub const SYSTEM_ROLE_CODES: &[&str] = &[
    ROLE_CODE_ADMIN,
    ROLE_CODE_OWNER,
    ROLE_CODE_MANAGER,
    ROLE_CODE_SALES,
    ROLE_CODE_PURCHASER,
    ROLE_CODE_WAREHOUSE,
    ROLE_CODE_CASHIER,
    ROLE_CODE_ACCOUNTANT,
];

// =============================================================================
// Resources and Actions
// =============================================================================

pub const RESOURCE_PRODUCT: &str = "product";
pub const RESOURCE_CATEGORY: &str = "category";
pub const RESOURCE_CUSTOMER: &str = "customer";
pub const RESOURCE_SUPPLIER: &str = "supplier";
pub const RESOURCE_WAREHOUSE: &str = "warehouse";
pub const RESOURCE_INVENTORY: &str = "inventory";
pub const RESOURCE_SALES_ORDER: &str = "sales_order";
pub const RESOURCE_PURCHASE_ORDER: &str = "purchase_order";
pub const RESOURCE_SALES_RETURN: &str = "sales_return";
pub const RESOURCE_PURCHASE_RETURN: &str = "purchase_return";
pub const RESOURCE_ACCOUNT_RECEIVABLE: &str = "account_receivable";
pub const RESOURCE_ACCOUNT_PAYABLE: &str = "account_payable";
pub const RESOURCE_RECEIPT: &str = "receipt";
pub const RESOURCE_PAYMENT: &str = "payment";
pub const RESOURCE_EXPENSE: &str = "expense";
pub const RESOURCE_INCOME: &str = "income";
pub const RESOURCE_REPORT: &str = "report";
pub const RESOURCE_USER: &str = "user";
pub const RESOURCE_ROLE: &str = "role";
pub const RESOURCE_TENANT: &str = "tenant";

pub const ACTION_CREATE: &str = "create";
pub const ACTION_READ: &str = "read";
pub const ACTION_UPDATE: &str = "update";
pub const ACTION_DELETE: &str = "delete";
pub const ACTION_ENABLE: &str = "enable";
pub const ACTION_DISABLE: &str = "disable";
pub const ACTION_CONFIRM: &str = "confirm";
pub const ACTION_CANCEL: &str = "cancel";
pub const ACTION_SHIP: &str = "ship";
pub const ACTION_RECEIVE: &str = "receive";
pub const ACTION_APPROVE: &str = "approve";
pub const ACTION_REJECT: &str = "reject";
pub const ACTION_ADJUST: &str = "adjust";
pub const ACTION_LOCK: &str = "lock";
pub const ACTION_UNLOCK: &str = "unlock";
pub const ACTION_RECONCILE: &str = "reconcile";
pub const ACTION_EXPORT: &str = "export";
pub const ACTION_IMPORT: &str = "import";
pub const ACTION_ASSIGN_ROLE: &str = "assign_role";
pub const ACTION_VIEW_ALL: &str = "view_all";

// =============================================================================
// Data Scopes
// =============================================================================

/// Field every warehouse scope filters on
pub const WAREHOUSE_SCOPE_FIELD: &str = "warehouse_id";

/// Column a self scope filters on
pub const CREATED_BY_FIELD: &str = "created_by";

/// Resources whose rows carry a `warehouse_id`
pub const WAREHOUSE_SCOPED_RESOURCES: &[&str] = &[
    "inventory",
    "sales_order",
    "purchase_order",
    "stock_batch",
    "stock_lock",
    "sales_return",
    "purchase_return",
    "stock_take",
    "stock_transfer",
];

/// Columns a custom scope may filter on
pub const ALLOWED_SCOPE_FIELDS: &[&str] = &[
    "warehouse_id",
    "region_id",
    "department_id",
    "created_by",
    "owner_id",
    "assigned_to",
];

// =============================================================================
// Validation
// =============================================================================

pub const MAX_PERMISSION_PART_LENGTH: usize = 50;

pub const MIN_ROLE_CODE_LENGTH: usize = 2;
pub const MAX_ROLE_CODE_LENGTH: usize = 50;
pub const MAX_ROLE_NAME_LENGTH: usize = 100;

pub const MIN_USERNAME_LENGTH: usize = 3;
pub const MAX_USERNAME_LENGTH: usize = 100;

/// Minimum password length requirement
pub const MIN_PASSWORD_LENGTH: usize = 8;
pub const MAX_PASSWORD_LENGTH: usize = 128;

pub const MAX_EMAIL_LENGTH: usize = 200;
pub const MAX_PHONE_LENGTH: usize = 50;
pub const MAX_DISPLAY_NAME_LENGTH: usize = 200;
pub const MAX_AVATAR_LENGTH: usize = 500;

// =============================================================================
// Authentication
// =============================================================================

/// Failed logins before an account locks
pub const DEFAULT_MAX_FAILED_ATTEMPTS: u32 = 5;

/// Lock duration applied by the login lockout, in seconds
pub const DEFAULT_LOCK_DURATION_SECS: i64 = 15 * 60;

/// Upper bound for a configured lock duration, in seconds (one year)
pub const MAX_LOCK_DURATION_SECS: i64 = 365 * 24 * 60 * 60;

/// Upper bound for configured token lifetimes, in seconds (one year)
pub const MAX_TOKEN_TTL_SECS: i64 = 365 * 24 * 60 * 60;

/// Upper bound for a configured per-request timeout, in milliseconds
pub const MAX_REQUEST_TIMEOUT_MS: u64 = 10 * 60 * 1000;

/// Minimum JWT secret length (security requirement)
pub const MIN_JWT_SECRET_LENGTH: usize = 32;

/// JWT token type identifier
pub const TOKEN_TYPE_BEARER: &str = "Bearer";
