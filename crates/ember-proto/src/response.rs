//! IRC numeric reply codes, as used by the RFC 1459 client protocol.
//!
//! Reply text lives at the call sites; this enum only names the numeric
//! space so handlers never write a bare integer.

#![allow(non_camel_case_types)]

use std::str::FromStr;
use thiserror::Error;

/// IRC server response code.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[repr(u16)]
pub enum Response {
    // === Connection registration ===
    /// 001 - Welcome to the IRC network
    RPL_WELCOME = 1,
    /// 002 - Your host is running version
    RPL_YOURHOST = 2,
    /// 003 - Server creation date
    RPL_CREATED = 3,
    /// 004 - Server info (name, version, user modes, channel modes)
    RPL_MYINFO = 4,

    // === Command replies ===
    /// 219 - End of STATS report
    RPL_ENDOFSTATS = 219,
    /// 221 - User mode string
    RPL_UMODEIS = 221,
    /// 242 - STATS uptime
    RPL_STATSUPTIME = 242,
    /// 251 - LUSERS client count
    RPL_LUSERCLIENT = 251,
    /// 252 - LUSERS operator count
    RPL_LUSEROP = 252,
    /// 254 - LUSERS channel count
    RPL_LUSERCHANNELS = 254,
    /// 255 - LUSERS local summary
    RPL_LUSERME = 255,
    /// 256 - ADMIN info start
    RPL_ADMINME = 256,
    /// 257 - ADMIN location 1
    RPL_ADMINLOC1 = 257,
    /// 258 - ADMIN location 2
    RPL_ADMINLOC2 = 258,
    /// 259 - ADMIN email
    RPL_ADMINEMAIL = 259,
    /// 301 - User is away
    RPL_AWAY = 301,
    /// 302 - USERHOST reply
    RPL_USERHOST = 302,
    /// 303 - ISON reply
    RPL_ISON = 303,
    /// 305 - No longer marked away
    RPL_UNAWAY = 305,
    /// 306 - Marked away
    RPL_NOWAWAY = 306,
    /// 311 - WHOIS user info
    RPL_WHOISUSER = 311,
    /// 312 - WHOIS server
    RPL_WHOISSERVER = 312,
    /// 313 - WHOIS operator status
    RPL_WHOISOPERATOR = 313,
    /// 314 - WHOWAS user info
    RPL_WHOWASUSER = 314,
    /// 315 - End of WHO list
    RPL_ENDOFWHO = 315,
    /// 317 - WHOIS idle time
    RPL_WHOISIDLE = 317,
    /// 318 - End of WHOIS
    RPL_ENDOFWHOIS = 318,
    /// 319 - WHOIS channel list
    RPL_WHOISCHANNELS = 319,
    /// 321 - LIST header
    RPL_LISTSTART = 321,
    /// 322 - LIST entry
    RPL_LIST = 322,
    /// 323 - End of LIST
    RPL_LISTEND = 323,
    /// 324 - Channel mode string
    RPL_CHANNELMODEIS = 324,
    /// 329 - Channel creation time (non-RFC)
    RPL_CHANCREATED = 329,
    /// 331 - No topic set
    RPL_NOTOPIC = 331,
    /// 332 - Channel topic
    RPL_TOPIC = 332,
    /// 333 - Topic setter and time (non-RFC)
    RPL_TOPICSET = 333,
    /// 341 - INVITE confirmation
    RPL_INVITING = 341,
    /// 351 - VERSION reply
    RPL_VERSION = 351,
    /// 352 - WHO reply
    RPL_WHOREPLY = 352,
    /// 353 - NAMES reply
    RPL_NAMREPLY = 353,
    /// 366 - End of NAMES
    RPL_ENDOFNAMES = 366,
    /// 367 - Ban list entry
    RPL_BANLIST = 367,
    /// 368 - End of ban list
    RPL_ENDOFBANLIST = 368,
    /// 369 - End of WHOWAS
    RPL_ENDOFWHOWAS = 369,
    /// 372 - MOTD line
    RPL_MOTD = 372,
    /// 375 - MOTD start
    RPL_MOTDSTART = 375,
    /// 376 - End of MOTD
    RPL_ENDOFMOTD = 376,
    /// 381 - You are now an operator
    RPL_YOUREOPER = 381,
    /// 391 - TIME reply
    RPL_TIME = 391,

    // === Error replies ===
    /// 401 - No such nick/channel
    ERR_NOSUCHNICK = 401,
    /// 402 - No such server
    ERR_NOSUCHSERVER = 402,
    /// 403 - No such channel
    ERR_NOSUCHCHANNEL = 403,
    /// 404 - Cannot send to channel
    ERR_CANNOTSENDTOCHAN = 404,
    /// 405 - Too many channels
    ERR_TOOMANYCHANNELS = 405,
    /// 406 - There was no such nickname
    ERR_WASNOSUCHNICK = 406,
    /// 409 - No origin specified
    ERR_NOORIGIN = 409,
    /// 412 - No text to send
    ERR_NOTEXTTOSEND = 412,
    /// 421 - Unknown command
    ERR_UNKNOWNCOMMAND = 421,
    /// 422 - MOTD file missing
    ERR_NOMOTD = 422,
    /// 431 - No nickname given
    ERR_NONICKNAMEGIVEN = 431,
    /// 432 - Erroneous nickname
    ERR_ERRONEUSNICKNAME = 432,
    /// 433 - Nickname in use
    ERR_NICKNAMEINUSE = 433,
    /// 441 - They aren't on that channel
    ERR_USERNOTINCHANNEL = 441,
    /// 442 - You're not on that channel
    ERR_NOTONCHANNEL = 442,
    /// 443 - User already on channel
    ERR_USERONCHANNEL = 443,
    /// 451 - You have not registered
    ERR_NOTREGISTERED = 451,
    /// 461 - Not enough parameters
    ERR_NEEDMOREPARAMS = 461,
    /// 462 - You may not reregister
    ERR_ALREADYREGISTRED = 462,
    /// 464 - Password mismatch
    ERR_PASSWDMISMATCH = 464,
    /// 465 - You are banned from this server
    ERR_YOUREBANNEDCREEP = 465,
    /// 467 - Channel key already set
    ERR_KEYSET = 467,
    /// 471 - Channel is full (+l)
    ERR_CHANNELISFULL = 471,
    /// 472 - Unknown mode character
    ERR_UNKNOWNMODE = 472,
    /// 473 - Invite-only channel (+i)
    ERR_INVITEONLYCHAN = 473,
    /// 474 - Banned from channel (+b)
    ERR_BANNEDFROMCHAN = 474,
    /// 475 - Bad channel key (+k)
    ERR_BADCHANNELKEY = 475,
    /// 481 - Not an IRC operator
    ERR_NOPRIVILEGES = 481,
    /// 482 - Not a channel operator
    ERR_CHANOPRIVSNEEDED = 482,
    /// 483 - You can't kill a server
    ERR_CANTKILLSERVER = 483,
    /// 491 - No O-lines for your host
    ERR_NOOPERHOST = 491,
    /// 502 - Can't change mode for other users
    ERR_USERSDONTMATCH = 502,
}

impl Response {
    /// The three-digit numeric code.
    pub fn code(self) -> u16 {
        self as u16
    }

    /// The wire form of the code (`001`, `433`, ...).
    pub fn as_str(self) -> String {
        format!("{:03}", self.code())
    }

    /// True for the 400-599 error range.
    pub fn is_error(self) -> bool {
        (400..600).contains(&self.code())
    }

    /// Map a numeric code back to its variant.
    pub fn from_code(code: u16) -> Option<Self> {
        ALL.iter().copied().find(|r| r.code() == code)
    }
}

/// Error for parsing a response code from its wire form.
#[derive(Debug, Error, PartialEq, Eq)]
#[error("unknown response code: {0}")]
pub struct UnknownResponseError(pub String);

impl FromStr for Response {
    type Err = UnknownResponseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.parse::<u16>()
            .ok()
            .and_then(Response::from_code)
            .ok_or_else(|| UnknownResponseError(s.to_string()))
    }
}

/// Every variant, for code lookup.
const ALL: &[Response] = &[
    Response::RPL_WELCOME,
    Response::RPL_YOURHOST,
    Response::RPL_CREATED,
    Response::RPL_MYINFO,
    Response::RPL_ENDOFSTATS,
    Response::RPL_UMODEIS,
    Response::RPL_STATSUPTIME,
    Response::RPL_LUSERCLIENT,
    Response::RPL_LUSEROP,
    Response::RPL_LUSERCHANNELS,
    Response::RPL_LUSERME,
    Response::RPL_ADMINME,
    Response::RPL_ADMINLOC1,
    Response::RPL_ADMINLOC2,
    Response::RPL_ADMINEMAIL,
    Response::RPL_AWAY,
    Response::RPL_USERHOST,
    Response::RPL_ISON,
    Response::RPL_UNAWAY,
    Response::RPL_NOWAWAY,
    Response::RPL_WHOISUSER,
    Response::RPL_WHOISSERVER,
    Response::RPL_WHOISOPERATOR,
    Response::RPL_WHOWASUSER,
    Response::RPL_ENDOFWHO,
    Response::RPL_WHOISIDLE,
    Response::RPL_ENDOFWHOIS,
    Response::RPL_WHOISCHANNELS,
    Response::RPL_LISTSTART,
    Response::RPL_LIST,
    Response::RPL_LISTEND,
    Response::RPL_CHANNELMODEIS,
    Response::RPL_CHANCREATED,
    Response::RPL_NOTOPIC,
    Response::RPL_TOPIC,
    Response::RPL_TOPICSET,
    Response::RPL_INVITING,
    Response::RPL_VERSION,
    Response::RPL_WHOREPLY,
    Response::RPL_NAMREPLY,
    Response::RPL_ENDOFNAMES,
    Response::RPL_BANLIST,
    Response::RPL_ENDOFBANLIST,
    Response::RPL_ENDOFWHOWAS,
    Response::RPL_MOTD,
    Response::RPL_MOTDSTART,
    Response::RPL_ENDOFMOTD,
    Response::RPL_YOUREOPER,
    Response::RPL_TIME,
    Response::ERR_NOSUCHNICK,
    Response::ERR_NOSUCHSERVER,
    Response::ERR_NOSUCHCHANNEL,
    Response::ERR_CANNOTSENDTOCHAN,
    Response::ERR_TOOMANYCHANNELS,
    Response::ERR_WASNOSUCHNICK,
    Response::ERR_NOORIGIN,
    Response::ERR_NOTEXTTOSEND,
    Response::ERR_UNKNOWNCOMMAND,
    Response::ERR_NOMOTD,
    Response::ERR_NONICKNAMEGIVEN,
    Response::ERR_ERRONEUSNICKNAME,
    Response::ERR_NICKNAMEINUSE,
    Response::ERR_USERNOTINCHANNEL,
    Response::ERR_NOTONCHANNEL,
    Response::ERR_USERONCHANNEL,
    Response::ERR_NOTREGISTERED,
    Response::ERR_NEEDMOREPARAMS,
    Response::ERR_ALREADYREGISTRED,
    Response::ERR_PASSWDMISMATCH,
    Response::ERR_YOUREBANNEDCREEP,
    Response::ERR_KEYSET,
    Response::ERR_CHANNELISFULL,
    Response::ERR_UNKNOWNMODE,
    Response::ERR_INVITEONLYCHAN,
    Response::ERR_BANNEDFROMCHAN,
    Response::ERR_BADCHANNELKEY,
    Response::ERR_NOPRIVILEGES,
    Response::ERR_CHANOPRIVSNEEDED,
    Response::ERR_CANTKILLSERVER,
    Response::ERR_NOOPERHOST,
    Response::ERR_USERSDONTMATCH,
];
