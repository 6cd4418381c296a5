// crates/zipgw-nms/src/frame/constants.rs

// --- Command Classes ---
pub const COMMAND_CLASS_APPLICATION_STATUS: u8 = 0x22;
pub const COMMAND_CLASS_NETWORK_MANAGEMENT_INCLUSION: u8 = 0x34;
pub const COMMAND_CLASS_NETWORK_MANAGEMENT_BASIC: u8 = 0x4D;
pub const COMMAND_CLASS_NETWORK_MANAGEMENT_PROXY: u8 = 0x52;
pub const COMMAND_CLASS_IP_ASSOCIATION: u8 = 0x5C;
pub const COMMAND_CLASS_INCLUSION_CONTROLLER: u8 = 0x74;
pub const COMMAND_CLASS_ASSOCIATION: u8 = 0x85;
pub const COMMAND_CLASS_SECURITY: u8 = 0x98;
pub const COMMAND_CLASS_SECURITY_2: u8 = 0x9F;

pub const APPLICATION_BUSY: u8 = 0x01;
pub const APPLICATION_BUSY_TRY_AGAIN_LATER: u8 = 0x00;

// --- Inclusion Commands ---
pub const NODE_ADD: u8 = 0x01;
pub const NODE_ADD_STATUS: u8 = 0x02;
pub const NODE_REMOVE: u8 = 0x03;
pub const NODE_REMOVE_STATUS: u8 = 0x04;
pub const FAILED_NODE_REMOVE: u8 = 0x07;
pub const FAILED_NODE_REMOVE_STATUS: u8 = 0x08;
pub const FAILED_NODE_REPLACE: u8 = 0x09;
pub const FAILED_NODE_REPLACE_STATUS: u8 = 0x0A;
pub const NODE_NEIGHBOR_UPDATE_REQUEST: u8 = 0x0B;
pub const NODE_NEIGHBOR_UPDATE_STATUS: u8 = 0x0C;
pub const RETURN_ROUTE_ASSIGN: u8 = 0x0D;
pub const RETURN_ROUTE_ASSIGN_COMPLETE: u8 = 0x0E;
pub const RETURN_ROUTE_DELETE: u8 = 0x0F;
pub const RETURN_ROUTE_DELETE_COMPLETE: u8 = 0x10;
pub const NODE_ADD_KEYS_REPORT: u8 = 0x11;
pub const NODE_ADD_KEYS_SET: u8 = 0x12;
pub const NODE_ADD_DSK_REPORT: u8 = 0x13;
pub const NODE_ADD_DSK_SET: u8 = 0x14;
pub const SMART_START_JOIN_STARTED_REPORT: u8 = 0x15;
pub const EXTENDED_NODE_ADD_STATUS: u8 = 0x16;
pub const INCLUDED_NIF_REPORT: u8 = 0x19;

// --- Basic Commands ---
pub const LEARN_MODE_SET: u8 = 0x01;
pub const LEARN_MODE_SET_STATUS: u8 = 0x02;
pub const NETWORK_UPDATE_REQUEST: u8 = 0x03;
pub const NETWORK_UPDATE_REQUEST_STATUS: u8 = 0x04;
pub const NODE_INFORMATION_SEND: u8 = 0x05;
pub const DEFAULT_SET: u8 = 0x06;
pub const DEFAULT_SET_COMPLETE: u8 = 0x07;
pub const DSK_GET: u8 = 0x08;
pub const DSK_REPORT: u8 = 0x09;

// --- Proxy Commands ---
pub const NODE_LIST_GET: u8 = 0x01;
pub const NODE_LIST_REPORT: u8 = 0x02;
pub const NODE_INFO_CACHED_GET: u8 = 0x03;
pub const NODE_INFO_CACHED_REPORT: u8 = 0x04;
pub const MULTI_CHANNEL_END_POINT_GET: u8 = 0x05;
pub const MULTI_CHANNEL_END_POINT_REPORT: u8 = 0x06;
pub const MULTI_CHANNEL_CAPABILITY_GET: u8 = 0x07;
pub const MULTI_CHANNEL_CAPABILITY_REPORT: u8 = 0x08;
pub const MULTI_CHANNEL_AGGREGATED_MEMBERS_GET: u8 = 0x09;
pub const MULTI_CHANNEL_AGGREGATED_MEMBERS_REPORT: u8 = 0x0A;
pub const FAILED_NODE_LIST_GET: u8 = 0x0B;
pub const FAILED_NODE_LIST_REPORT: u8 = 0x0C;

// --- Radio add/remove modes ---
pub const ADD_NODE_ANY: u8 = 0x01;
pub const ADD_NODE_STOP: u8 = 0x05;
pub const ADD_NODE_STOP_FAILED: u8 = 0x06;
pub const ADD_NODE_HOME_ID: u8 = 0x08;
pub const ADD_NODE_SMART_START: u8 = 0x09;
pub const ADD_NODE_OPTION_NORMAL_POWER: u8 = 0x80;
pub const ADD_NODE_OPTION_NETWORK_WIDE: u8 = 0x40;
pub const ADD_NODE_OPTION_LONG_RANGE: u8 = 0x20;
pub const ADD_NODE_OPTION_SFLND: u8 = 0x10;

pub const REMOVE_NODE_ANY: u8 = 0x01;
pub const REMOVE_NODE_STOP: u8 = 0x05;
pub const REMOVE_NODE_OPTION_NORMAL_POWER: u8 = 0x80;
pub const REMOVE_NODE_OPTION_NETWORK_WIDE: u8 = 0x40;

// --- Client request modes ---
pub const NODE_ADD_ANY: u8 = 0x01;
pub const NODE_ADD_STOP: u8 = 0x05;
pub const NODE_ADD_ANY_S2: u8 = 0x07;
pub const NODE_REMOVE_ANY: u8 = 0x01;
pub const NODE_REMOVE_STOP: u8 = 0x05;
pub const START_FAILED_NODE_REPLACE: u8 = 0x01;
pub const STOP_FAILED_NODE_REPLACE: u8 = 0x05;
pub const START_FAILED_NODE_REPLACE_S2: u8 = 0x07;

pub const LEARN_MODE_DISABLE: u8 = 0x00;
pub const LEARN_MODE_CLASSIC: u8 = 0x01;
pub const LEARN_MODE_NWI: u8 = 0x02;
pub const LEARN_MODE_NWE: u8 = 0x03;
pub const LEARN_MODE_RETURN_INTERVIEW_STATUS: u8 = 0x01;

pub const NODE_ADD_KEYS_SET_ACCEPT: u8 = 0x01;
pub const NODE_ADD_KEYS_SET_CSA: u8 = 0x02;
pub const NODE_ADD_DSK_SET_ACCEPT: u8 = 0x80;
pub const NODE_ADD_DSK_SET_LENGTH_MASK: u8 = 0x0F;
pub const DSK_LENGTH_MASK: u8 = 0x1F;

// --- Radio callback statuses ---
pub const ADD_NODE_STATUS_LEARN_READY: u8 = 0x01;
pub const ADD_NODE_STATUS_NODE_FOUND: u8 = 0x02;
pub const ADD_NODE_STATUS_ADDING_END_NODE: u8 = 0x03;
pub const ADD_NODE_STATUS_ADDING_CONTROLLER: u8 = 0x04;
pub const ADD_NODE_STATUS_PROTOCOL_DONE: u8 = 0x05;
pub const ADD_NODE_STATUS_DONE: u8 = 0x06;
pub const ADD_NODE_STATUS_FAILED: u8 = 0x07;
pub const ADD_NODE_STATUS_SFLND_DONE: u8 = 0x08;
pub const ADD_NODE_STATUS_NOT_PRIMARY: u8 = 0x23;

pub const REMOVE_NODE_STATUS_LEARN_READY: u8 = 0x01;
pub const REMOVE_NODE_STATUS_NODE_FOUND: u8 = 0x02;
pub const REMOVE_NODE_STATUS_REMOVING_END_NODE: u8 = 0x03;
pub const REMOVE_NODE_STATUS_REMOVING_CONTROLLER: u8 = 0x04;
pub const REMOVE_NODE_STATUS_DONE: u8 = 0x06;
pub const REMOVE_NODE_STATUS_FAILED: u8 = 0x07;

pub const LEARN_MODE_STATUS_STARTED: u8 = 0x01;
pub const LEARN_MODE_STATUS_DONE: u8 = 0x06;
pub const LEARN_MODE_STATUS_FAILED: u8 = 0x07;

// --- Reply statuses ---
pub const NODE_ADD_STATUS_DONE: u8 = 0x06;
pub const NODE_ADD_STATUS_FAILED: u8 = 0x07;
pub const NODE_ADD_STATUS_SECURITY_FAILED: u8 = 0x09;
pub const NODE_REMOVE_STATUS_DONE: u8 = 0x06;
pub const NODE_REMOVE_STATUS_FAILED: u8 = 0x07;
pub const FAILED_NODE_REMOVE_NOT_FOUND: u8 = 0x00;
pub const FAILED_NODE_REMOVE_DONE: u8 = 0x01;
pub const FAILED_NODE_REMOVE_FAIL: u8 = 0x02;
pub const FAILED_NODE_REPLACE_DONE: u8 = 0x04;
pub const FAILED_NODE_REPLACE_FAILED: u8 = 0x05;
pub const LEARN_MODE_DONE: u8 = 0x06;
pub const LEARN_MODE_FAILED: u8 = 0x07;
pub const LEARN_MODE_SECURITY_FAILED: u8 = 0x09;
pub const LEARN_MODE_INTERVIEW_COMPLETED: u8 = 0x08;
pub const DEFAULT_SET_DONE: u8 = 0x06;
pub const DEFAULT_SET_BUSY: u8 = 0x07;
pub const REQUEST_NEIGHBOR_UPDATE_STARTED: u8 = 0x21;
pub const REQUEST_NEIGHBOR_UPDATE_DONE: u8 = 0x22;
pub const REQUEST_NEIGHBOR_UPDATE_FAILED: u8 = 0x23;
pub const SUC_UPDATE_DONE: u8 = 0x00;
pub const SUC_UPDATE_ABORT: u8 = 0x01;
pub const SUC_UPDATE_WAIT: u8 = 0x02;
pub const SUC_UPDATE_DISABLED: u8 = 0x03;
pub const SUC_UPDATE_OVERFLOW: u8 = 0x04;
pub const TRANSMIT_COMPLETE_OK: u8 = 0x00;
pub const TRANSMIT_COMPLETE_NO_ACK: u8 = 0x01;
pub const TRANSMIT_COMPLETE_FAIL: u8 = 0x02;

pub const NODE_LIST_REPORT_LATEST: u8 = 0x00;
pub const NODE_LIST_REPORT_NO_GUARANTEE: u8 = 0x01;
pub const NODE_INFO_CACHED_STATUS_OK: u8 = 0x00;
pub const NODE_INFO_CACHED_STATUS_NOT_RESPONDING: u8 = 0x01;
pub const NODE_INFO_CACHED_STATUS_UNKNOWN: u8 = 0x02;

// --- Transmit options ---
pub const TRANSMIT_OPTION_ACK: u8 = 0x01;
pub const TRANSMIT_OPTION_LOW_POWER: u8 = 0x02;
pub const TRANSMIT_OPTION_AUTO_ROUTE: u8 = 0x04;
pub const TRANSMIT_OPTION_EXPLORE: u8 = 0x20;

// --- Controller capabilities ---
pub const CONTROLLER_IS_SECONDARY: u8 = 0x01;
pub const CONTROLLER_NODEID_SERVER_PRESENT: u8 = 0x04;

// --- Network update wait flags ---
pub const NETWORK_UPDATE_FLAG_DHCPV4: u8 = 0x01;
pub const NETWORK_UPDATE_FLAG_PROBE: u8 = 0x02;
pub const NETWORK_UPDATE_FLAG_VIRTUAL: u8 = 0x04;
pub const NETWORK_UPDATE_FLAG_DISABLED: u8 = 0x80;
pub const NETWORK_UPDATE_FLAGS_ALL: u8 =
    NETWORK_UPDATE_FLAG_DHCPV4 | NETWORK_UPDATE_FLAG_PROBE | NETWORK_UPDATE_FLAG_VIRTUAL;
