//! Decoding of Moab `mrsvctl -q <id|ALL> --xml` reports.
//!
//! Only a small subset of XML is needed: elements with quoted attributes, text,
//! declarations and comments. Every `<rsv>` element becomes one raw reservation, its
//! `<ACL type="USER|GROUP" name="...">` children fill the access lists.
use anyhow::Context;
use nom::branch::alt;
use nom::bytes::complete::{tag, take_till, take_until, take_while1};
use nom::character::complete::{char, multispace0, multispace1};
use nom::combinator::{map, opt};
use nom::multi::many0;
use nom::sequence::{delimited, preceded, separated_pair, tuple};

use crate::assemble::RawReservationDescriptor;
use crate::common::parser::{NomResult, consume_all};

/// Reservation subtypes reported to users.
/// Moab also lists running jobs among reservations, these have other subtypes.
pub const VALID_SUBTYPES: &[&str] = &["StandingReservation"];

pub fn is_valid_subtype(subtype: &str) -> bool {
    VALID_SUBTYPES.contains(&subtype)
}

#[derive(Debug, PartialEq)]
enum XmlToken<'a> {
    Open {
        name: &'a str,
        attributes: Vec<(&'a str, &'a str)>,
        self_closing: bool,
    },
    Close(&'a str),
    Text(&'a str),
    Skip,
}

fn p_name(input: &str) -> NomResult<&str> {
    take_while1(|c: char| c.is_alphanumeric() || matches!(c, '_' | '-' | ':' | '.'))(input)
}

fn p_quoted(input: &str) -> NomResult<&str> {
    alt((
        delimited(char('"'), take_till(|c: char| c == '"'), char('"')),
        delimited(char('\''), take_till(|c: char| c == '\''), char('\'')),
    ))(input)
}

fn p_attribute(input: &str) -> NomResult<(&str, &str)> {
    preceded(
        multispace1,
        separated_pair(p_name, tuple((multispace0, char('='), multispace0)), p_quoted),
    )(input)
}

fn p_open_tag(input: &str) -> NomResult<XmlToken> {
    map(
        tuple((
            char('<'),
            p_name,
            many0(p_attribute),
            multispace0,
            opt(char('/')),
            char('>'),
        )),
        |(_, name, attributes, _, slash, _)| XmlToken::Open {
            name,
            attributes,
            self_closing: slash.is_some(),
        },
    )(input)
}

fn p_close_tag(input: &str) -> NomResult<XmlToken> {
    map(
        delimited(tag("</"), p_name, preceded(multispace0, char('>'))),
        XmlToken::Close,
    )(input)
}

fn p_skipped(input: &str) -> NomResult<XmlToken> {
    map(
        alt((
            delimited(tag("<?"), take_until("?>"), tag("?>")),
            delimited(tag("<!--"), take_until("-->"), tag("-->")),
            delimited(tag("<!"), take_until(">"), tag(">")),
        )),
        |_| XmlToken::Skip,
    )(input)
}

fn p_text(input: &str) -> NomResult<XmlToken> {
    map(take_while1(|c: char| c != '<'), XmlToken::Text)(input)
}

fn p_token(input: &str) -> NomResult<XmlToken> {
    alt((p_skipped, p_close_tag, p_open_tag, p_text))(input)
}

fn unescape(value: &str) -> String {
    if !value.contains('&') {
        return value.to_string();
    }
    value
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&apos;", "'")
        .replace("&amp;", "&")
}

fn attribute(attributes: &[(&str, &str)], name: &str) -> String {
    attributes
        .iter()
        .find(|(key, _)| *key == name)
        .map(|(_, value)| unescape(value))
        .unwrap_or_default()
}

fn reservation_from_attributes(attributes: &[(&str, &str)]) -> RawReservationDescriptor {
    RawReservationDescriptor {
        id: attribute(attributes, "Name"),
        start_time: attribute(attributes, "starttime"),
        end_time: attribute(attributes, "endtime"),
        acl_users: vec![],
        acl_groups: vec![],
        allocated_node_names: attribute(attributes, "AllocNodeList"),
        subtype: attribute(attributes, "SubType"),
    }
}

fn add_acl(reservation: &mut RawReservationDescriptor, attributes: &[(&str, &str)]) {
    let name = attribute(attributes, "name");
    match attribute(attributes, "type").as_str() {
        "USER" => reservation.acl_users.push(name),
        "GROUP" => reservation.acl_groups.push(name),
        _ => {}
    }
}

/// Extracts all reservation records of a report, regardless of their subtype.
pub fn parse_reservations(xml: &str) -> anyhow::Result<Vec<RawReservationDescriptor>> {
    let tokens = consume_all(many0(p_token), xml).context("Cannot parse Moab XML output")?;

    let mut reservations = Vec::new();
    let mut current: Option<RawReservationDescriptor> = None;
    for token in tokens {
        match token {
            XmlToken::Open {
                name: "rsv",
                attributes,
                self_closing,
            } => {
                if current.is_some() {
                    anyhow::bail!("Nested rsv element in Moab XML output");
                }
                let reservation = reservation_from_attributes(&attributes);
                if self_closing {
                    reservations.push(reservation);
                } else {
                    current = Some(reservation);
                }
            }
            XmlToken::Open {
                name: "ACL",
                attributes,
                ..
            } => {
                if let Some(reservation) = current.as_mut() {
                    add_acl(reservation, &attributes);
                }
            }
            XmlToken::Close("rsv") => match current.take() {
                Some(reservation) => reservations.push(reservation),
                None => anyhow::bail!("Unexpected closing rsv element in Moab XML output"),
            },
            XmlToken::Open { .. } | XmlToken::Close(_) | XmlToken::Text(_) | XmlToken::Skip => {}
        }
    }
    if current.is_some() {
        anyhow::bail!("Unterminated rsv element in Moab XML output");
    }
    Ok(reservations)
}

#[cfg(test)]
mod test {
    use super::{XmlToken, is_valid_subtype, p_open_tag, parse_reservations, unescape};

    const REPORT: &str = r#"<?xml version="1.0"?>
<Data>
  <rsv AllocNodeCount="2" AllocNodeList="n0001,n0002" AllocProcCount="24" Name="efranz.1" SubType="StandingReservation" Type="User" endtime="1469109600" starttime="1469023200">
    <ACL aff="neutral" cmp="%=" name="efranz" type="USER"></ACL>
    <ACL aff="neutral" cmp="%=" name="ghost" type="USER"></ACL>
    <ACL aff="neutral" cmp="%=" name="PZS0002" type="GROUP"/>
    <ACL aff="neutral" cmp="%=" name="batch" type="CLASS"/>
    <History><event state="Active" time="1469023200"></event></History>
  </rsv>
  <!-- running jobs show up as reservations too -->
  <rsv AllocNodeList="n0003" Name="7196466" SubType="JobReservation" endtime="1469110000" starttime="1469020000"/>
</Data>
"#;

    #[test]
    fn test_parse_report() {
        let reservations = parse_reservations(REPORT).unwrap();
        assert_eq!(reservations.len(), 2);

        let rsv = &reservations[0];
        assert_eq!(rsv.id, "efranz.1");
        assert_eq!(rsv.start_time, "1469023200");
        assert_eq!(rsv.end_time, "1469109600");
        assert_eq!(rsv.allocated_node_names, "n0001,n0002");
        assert_eq!(rsv.acl_users, vec!["efranz", "ghost"]);
        assert_eq!(rsv.acl_groups, vec!["PZS0002"]);
        assert!(is_valid_subtype(&rsv.subtype));

        let job = &reservations[1];
        assert_eq!(job.id, "7196466");
        assert!(job.acl_users.is_empty());
        assert!(!is_valid_subtype(&job.subtype));
    }

    #[test]
    fn test_parse_empty_report() {
        assert!(parse_reservations("<Data></Data>").unwrap().is_empty());
        assert!(parse_reservations("").unwrap().is_empty());
    }

    #[test]
    fn test_parse_missing_attributes() {
        let reservations = parse_reservations("<Data><rsv Name='x'/></Data>").unwrap();
        assert_eq!(reservations[0].id, "x");
        assert_eq!(reservations[0].allocated_node_names, "");
        assert_eq!(reservations[0].start_time, "");
    }

    #[test]
    fn test_parse_escaped_attributes() {
        let reservations =
            parse_reservations(r#"<rsv Name="a&amp;b" SubType="StandingReservation"></rsv>"#)
                .unwrap();
        assert_eq!(reservations[0].id, "a&b");
        assert_eq!(unescape("&lt;&amp;lt;&gt;"), "<&lt;>");
    }

    #[test]
    fn test_parse_invalid_report() {
        assert!(parse_reservations("<Data><rsv Name=x></rsv></Data>").is_err());
        assert!(parse_reservations("<Data><rsv Name='x'></Data>").is_err());
        assert!(parse_reservations("<rsv Name='a'><rsv Name='b'/></rsv>").is_err());
    }

    #[test]
    fn test_parse_open_tag() {
        let (rest, token) = p_open_tag(r#"<ACL  name = "u1"  type='USER' />tail"#).unwrap();
        assert_eq!(rest, "tail");
        assert_eq!(
            token,
            XmlToken::Open {
                name: "ACL",
                attributes: vec![("name", "u1"), ("type", "USER")],
                self_closing: true
            }
        );
    }
}
