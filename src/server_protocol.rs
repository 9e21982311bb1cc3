use serde_json::Value;

use crate::types::Direction;

#[derive(Debug)]
pub enum ParsedClientMessage {
    Hello {
        address: Option<String>,
        seed: Option<i64>,
    },
    Move {
        dir: Direction,
    },
    Restart,
    Pause,
    Save,
    Claim,
    Convert {
        keys: i64,
    },
    Ping {
        t: f64,
    },
}

pub fn parse_client_message(raw: &str) -> Option<ParsedClientMessage> {
    let value: Value = serde_json::from_str(raw).ok()?;
    let object = value.as_object()?;
    let message_type = object.get("type")?.as_str()?;

    match message_type {
        "hello" => {
            let address = match object.get("address") {
                None | Some(Value::Null) => None,
                Some(value) => Some(value.as_str()?.to_string()),
            };
            let seed = parse_optional_i64(object.get("seed"))?;
            Some(ParsedClientMessage::Hello { address, seed })
        }
        "move" => {
            let dir = Direction::parse_move(object.get("dir")?.as_str()?)?;
            Some(ParsedClientMessage::Move { dir })
        }
        "restart" => Some(ParsedClientMessage::Restart),
        "pause" => Some(ParsedClientMessage::Pause),
        "save" => Some(ParsedClientMessage::Save),
        "claim" => Some(ParsedClientMessage::Claim),
        "convert" => {
            let keys = parse_optional_i64(object.get("keys"))??;
            Some(ParsedClientMessage::Convert { keys })
        }
        "ping" => {
            let t = object.get("t")?.as_f64()?;
            if !t.is_finite() {
                return None;
            }
            Some(ParsedClientMessage::Ping { t })
        }
        _ => None,
    }
}

fn parse_optional_i64(value: Option<&Value>) -> Option<Option<i64>> {
    const MAX_SAFE_INTEGER_F64: f64 = 9_007_199_254_740_991.0;

    let Some(value) = value else {
        return Some(None);
    };
    if let Some(number) = value.as_i64() {
        return Some(Some(number));
    }
    if let Some(number) = value.as_u64() {
        return i64::try_from(number).ok().map(Some);
    }
    if let Some(number) = value.as_f64() {
        if number.is_finite() {
            let floored = number.floor();
            if floored.abs() > MAX_SAFE_INTEGER_F64 {
                return None;
            }
            return Some(Some(floored as i64));
        }
    }
    None
}
