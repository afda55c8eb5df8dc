use chrono::Utc;

/// Wire format: `COMMAND#PARAM1#PARAM2`, one message per line.
/// PARAM2 is always the last field, so any `#` it contains survives
/// the split. For content-carrying types (EDIT, SAVE_FILE,
/// OPEN_FILE_RESPONSE) newlines in PARAM2 travel as the two-character
/// sequence `\n`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageType {
    Login,
    ListFilesRequest,
    OpenFileRequest,
    Edit,
    CreateFile,
    SaveFile,

    ListFilesResponse,
    OpenFileResponse,
    Success,
    Error,

    UserJoined,
    UserLeft,

    Unknown,
}

impl MessageType {
    pub fn command(&self) -> &'static str {
        match self {
            MessageType::Login => "LOGIN",
            MessageType::ListFilesRequest => "LIST_FILES_REQUEST",
            MessageType::OpenFileRequest => "OPEN_FILE_REQUEST",
            MessageType::Edit => "EDIT",
            MessageType::CreateFile => "CREATE_FILE",
            MessageType::SaveFile => "SAVE_FILE",
            MessageType::ListFilesResponse => "LIST_FILES_RESPONSE",
            MessageType::OpenFileResponse => "OPEN_FILE_RESPONSE",
            MessageType::Success => "SUCCESS",
            MessageType::Error => "ERROR",
            MessageType::UserJoined => "USER_JOINED",
            MessageType::UserLeft => "USER_LEFT",
            MessageType::Unknown => "UNKNOWN",
        }
    }

    pub fn from_command(command: &str) -> MessageType {
        match command.trim().to_uppercase().as_str() {
            "LOGIN" => MessageType::Login,
            "LIST_FILES_REQUEST" => MessageType::ListFilesRequest,
            "OPEN_FILE_REQUEST" => MessageType::OpenFileRequest,
            "EDIT" => MessageType::Edit,
            "CREATE_FILE" => MessageType::CreateFile,
            "SAVE_FILE" => MessageType::SaveFile,
            "LIST_FILES_RESPONSE" => MessageType::ListFilesResponse,
            "OPEN_FILE_RESPONSE" => MessageType::OpenFileResponse,
            "SUCCESS" => MessageType::Success,
            "ERROR" => MessageType::Error,
            "USER_JOINED" => MessageType::UserJoined,
            "USER_LEFT" => MessageType::UserLeft,
            _ => MessageType::Unknown,
        }
    }

    pub fn requires_auth(&self) -> bool {
        !matches!(self, MessageType::Login | MessageType::Unknown)
    }

    pub fn is_broadcast(&self) -> bool {
        matches!(
            self,
            MessageType::UserJoined | MessageType::UserLeft | MessageType::Edit
        )
    }

    /// Types whose PARAM2 carries document content and therefore uses
    /// the `\n` escape on the wire.
    fn escapes_content(&self) -> bool {
        matches!(
            self,
            MessageType::Edit | MessageType::SaveFile | MessageType::OpenFileResponse
        )
    }
}

#[derive(Debug, Clone)]
pub struct Message {
    msg_type: MessageType,
    parameter1: String,
    parameter2: String,
    timestamp: i64,
}

impl Message {
    fn new(msg_type: MessageType, parameter1: &str, parameter2: &str) -> Self {
        Message {
            msg_type,
            parameter1: parameter1.to_string(),
            parameter2: parameter2.to_string(),
            timestamp: Utc::now().timestamp_millis(),
        }
    }

    pub fn login(username: &str) -> Self {
        Message::new(MessageType::Login, username, "")
    }

    pub fn list_files_request() -> Self {
        Message::new(MessageType::ListFilesRequest, "", "")
    }

    pub fn list_files_response(file_list: &str) -> Self {
        Message::new(MessageType::ListFilesResponse, file_list, "")
    }

    pub fn open_file_request(file_name: &str) -> Self {
        Message::new(MessageType::OpenFileRequest, file_name, "")
    }

    pub fn open_file_response(file_name: &str, content: &str) -> Self {
        Message::new(MessageType::OpenFileResponse, file_name, content)
    }

    pub fn edit(file_name: &str, content: &str) -> Self {
        Message::new(MessageType::Edit, file_name, content)
    }

    pub fn create_file(file_name: &str) -> Self {
        Message::new(MessageType::CreateFile, file_name, "")
    }

    pub fn save_file(file_name: &str, content: &str) -> Self {
        Message::new(MessageType::SaveFile, file_name, content)
    }

    pub fn success(text: &str) -> Self {
        Message::new(MessageType::Success, text, "")
    }

    pub fn error(code: &str, text: &str) -> Self {
        Message::new(MessageType::Error, code, text)
    }

    pub fn user_joined(username: &str) -> Self {
        Message::new(MessageType::UserJoined, username, "")
    }

    pub fn user_left(username: &str) -> Self {
        Message::new(MessageType::UserLeft, username, "")
    }

    /// Decodes one line off the wire. Never fails: garbage comes back
    /// as `Unknown`, which `is_valid` then rejects.
    pub fn decode(raw: &str) -> Self {
        if raw.trim().is_empty() {
            return Message::new(MessageType::Unknown, "", "");
        }

        // At most three fields; everything after the second `#` stays
        // in parameter2 untouched, including further `#` characters.
        let mut parts = raw.splitn(3, '#');
        let command = parts.next().unwrap_or("").trim();
        let parameter1 = parts.next().unwrap_or("").trim();
        let parameter2 = parts.next().unwrap_or("");

        let msg_type = MessageType::from_command(command);
        let parameter2 = if msg_type.escapes_content() {
            parameter2.replace("\\n", "\n")
        } else {
            parameter2.to_string()
        };

        Message::new(msg_type, parameter1, &parameter2)
    }

    pub fn encode(&self) -> String {
        let parameter2 = if self.msg_type.escapes_content() {
            self.parameter2.replace('\n', "\\n")
        } else {
            self.parameter2.clone()
        };
        format!("{}#{}#{}", self.msg_type.command(), self.parameter1, parameter2)
    }

    pub fn is_valid(&self) -> bool {
        match self.msg_type {
            MessageType::Login
            | MessageType::OpenFileRequest
            | MessageType::CreateFile
            | MessageType::Edit
            | MessageType::SaveFile
            | MessageType::OpenFileResponse
            | MessageType::Error => !self.parameter1.trim().is_empty(),

            MessageType::ListFilesRequest
            | MessageType::Success
            | MessageType::UserJoined
            | MessageType::UserLeft
            | MessageType::ListFilesResponse => true,

            MessageType::Unknown => false,
        }
    }

    pub fn msg_type(&self) -> MessageType {
        self.msg_type
    }

    pub fn parameter1(&self) -> &str {
        &self.parameter1
    }

    pub fn parameter2(&self) -> &str {
        &self.parameter2
    }

    pub fn timestamp(&self) -> i64 {
        self.timestamp
    }
}

// The timestamp is diagnostic only; two messages are the same message
// if type and parameters match.
impl PartialEq for Message {
    fn eq(&self, other: &Self) -> bool {
        self.msg_type == other.msg_type
            && self.parameter1 == other.parameter1
            && self.parameter2 == other.parameter2
    }
}

impl Eq for Message {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_login() {
        let msg = Message::decode("LOGIN#alice#");
        assert_eq!(msg.msg_type(), MessageType::Login);
        assert_eq!(msg.parameter1(), "alice");
        assert_eq!(msg.parameter2(), "");
        assert!(msg.is_valid());
    }

    #[test]
    fn test_decode_is_case_insensitive() {
        let msg = Message::decode("login#alice#");
        assert_eq!(msg.msg_type(), MessageType::Login);
        assert_eq!(msg.encode(), "LOGIN#alice#");
    }

    #[test]
    fn test_decode_missing_fields_default_to_empty() {
        let msg = Message::decode("LIST_FILES_REQUEST");
        assert_eq!(msg.msg_type(), MessageType::ListFilesRequest);
        assert_eq!(msg.parameter1(), "");
        assert_eq!(msg.parameter2(), "");
        assert!(msg.is_valid());
    }

    #[test]
    fn test_decode_blank_input_is_unknown() {
        for raw in ["", "   ", "\t"] {
            let msg = Message::decode(raw);
            assert_eq!(msg.msg_type(), MessageType::Unknown);
            assert!(!msg.is_valid());
        }
    }

    #[test]
    fn test_decode_unknown_command() {
        let msg = Message::decode("DELETE_FILE#notes.txt#");
        assert_eq!(msg.msg_type(), MessageType::Unknown);
        assert!(!msg.is_valid());
    }

    #[test]
    fn test_hash_in_content_stays_in_parameter2() {
        let msg = Message::decode("EDIT#notes.txt#a#b#c");
        assert_eq!(msg.parameter1(), "notes.txt");
        assert_eq!(msg.parameter2(), "a#b#c");
    }

    #[test]
    fn test_newline_escape_round_trip() {
        let original = Message::edit("notes.txt", "hello\nworld");
        let wire = original.encode();
        assert_eq!(wire, "EDIT#notes.txt#hello\\nworld");

        let decoded = Message::decode(&wire);
        assert_eq!(decoded, original);
        assert_eq!(decoded.parameter2(), "hello\nworld");
    }

    #[test]
    fn test_no_escape_for_plain_types() {
        // LIST_FILES_RESPONSE does not use the content escape.
        let msg = Message::list_files_response("a.txt,b.txt");
        assert_eq!(msg.encode(), "LIST_FILES_RESPONSE#a.txt,b.txt#");
        assert_eq!(Message::decode(&msg.encode()), msg);
    }

    #[test]
    fn test_round_trip_all_content_types() {
        let content = "line one\nline two\n";
        for msg in [
            Message::edit("f.txt", content),
            Message::save_file("f.txt", content),
            Message::open_file_response("f.txt", content),
        ] {
            let decoded = Message::decode(&msg.encode());
            assert_eq!(decoded, msg);
        }
    }

    #[test]
    fn test_validity_requires_parameter1() {
        assert!(!Message::decode("LOGIN##").is_valid());
        assert!(!Message::decode("OPEN_FILE_REQUEST#  #").is_valid());
        assert!(!Message::decode("CREATE_FILE##").is_valid());
        assert!(Message::decode("SUCCESS##").is_valid());
        assert!(Message::decode("USER_JOINED##").is_valid());
    }

    #[test]
    fn test_requires_auth_flags() {
        assert!(!MessageType::Login.requires_auth());
        assert!(!MessageType::Unknown.requires_auth());
        assert!(MessageType::Edit.requires_auth());
        assert!(MessageType::ListFilesRequest.requires_auth());
        assert!(MessageType::CreateFile.requires_auth());
    }

    #[test]
    fn test_broadcast_flags() {
        assert!(MessageType::UserJoined.is_broadcast());
        assert!(MessageType::UserLeft.is_broadcast());
        assert!(MessageType::Edit.is_broadcast());
        assert!(!MessageType::SaveFile.is_broadcast());
    }
}
