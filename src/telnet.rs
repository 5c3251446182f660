//! Line-protocol writer over TCP.
//!
//! Each data point is sent as one line:
//!
//! ```text
//! putm <metric> <timestamp_ms> <value> <tag>=<value> ...
//! ```
//!
//! The server never answers, so nothing is read back. Lines are buffered until
//! [`flush`](TelnetClient::flush) is called.

use tokio::io::{AsyncWriteExt, BufWriter};
use tokio::net::{TcpStream, ToSocketAddrs};
use tracing::debug;

use crate::error::{Error, Result};
use crate::metric::{Metric, MetricBuilder};
use crate::value::{DataPoint, DataPointValue};

/// Buffered line-protocol connection.
#[derive(Debug)]
pub struct TelnetClient {
    writer: BufWriter<TcpStream>,
}

impl TelnetClient {
    pub async fn connect<A: ToSocketAddrs>(addr: A) -> Result<Self> {
        let stream = TcpStream::connect(addr).await?;
        debug!(peer = ?stream.peer_addr().ok(), "connected line-protocol writer");
        Ok(Self {
            writer: BufWriter::new(stream),
        })
    }

    /// Queue every data point of `builder`, one line each.
    ///
    /// All lines are formatted before any is written, so a batch that fails
    /// validation leaves the connection untouched.
    pub async fn put_metrics(&mut self, builder: &MetricBuilder) -> Result<()> {
        let mut lines = Vec::new();
        for metric in builder.metrics() {
            if metric.tags().is_empty() {
                return Err(Error::validation(format!(
                    "metric '{}' must contain at least one tag",
                    metric.name()
                )));
            }
            for point in metric.data_points() {
                lines.push(format_line(metric, point)?);
            }
        }
        for line in &lines {
            self.write_line(line).await?;
        }
        debug!(lines = lines.len(), "queued data points");
        Ok(())
    }

    /// Queue one raw line. The newline is appended here.
    pub async fn write_line(&mut self, line: &str) -> Result<()> {
        self.writer.write_all(line.as_bytes()).await?;
        self.writer.write_all(b"\n").await?;
        Ok(())
    }

    pub async fn flush(&mut self) -> Result<()> {
        self.writer.flush().await?;
        Ok(())
    }

    /// Flush and close the write half of the connection.
    pub async fn shutdown(mut self) -> Result<()> {
        self.writer.shutdown().await?;
        Ok(())
    }
}

fn check_token(what: &str, token: &str) -> Result<()> {
    if token.is_empty() || token.chars().any(char::is_whitespace) {
        return Err(Error::validation(format!(
            "{} '{}' cannot be sent over the line protocol",
            what, token
        )));
    }
    Ok(())
}

pub(crate) fn format_line(metric: &Metric, point: &DataPoint) -> Result<String> {
    check_token("metric name", metric.name())?;
    let value = match point.value() {
        DataPointValue::Long(v) => v.to_string(),
        // keep the decimal point so the server stores a double
        DataPointValue::Double(v) => format!("{:?}", v.into_inner()),
        other => {
            return Err(Error::validation(format!(
                "only numeric values can be sent over the line protocol, metric '{}' has {}",
                metric.name(),
                other
            )));
        }
    };

    let mut line = format!("putm {} {} {}", metric.name(), point.timestamp(), value);
    for (name, tag_value) in metric.tags() {
        check_token("tag name", name)?;
        check_token("tag value", tag_value)?;
        line.push(' ');
        line.push_str(name);
        line.push('=');
        line.push_str(tag_value);
    }
    Ok(line)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn builder() -> MetricBuilder {
        let mut builder = MetricBuilder::new();
        builder
            .add_metric("cpu.load")
            .unwrap()
            .add_tag("host", "s1")
            .unwrap()
            .add_tag("dc", "east")
            .unwrap()
            .add_data_point(1000, 5)
            .unwrap()
            .add_data_point(2000, 1.5)
            .unwrap()
            .add_data_point(3000, 30.0)
            .unwrap();
        builder
    }

    #[test]
    fn test_format_line() {
        let builder = builder();
        let metric = &builder.metrics()[0];
        assert_eq!(
            format_line(metric, &metric.data_points()[0]).unwrap(),
            "putm cpu.load 1000 5 dc=east host=s1"
        );
        assert_eq!(
            format_line(metric, &metric.data_points()[1]).unwrap(),
            "putm cpu.load 2000 1.5 dc=east host=s1"
        );
        assert_eq!(
            format_line(metric, &metric.data_points()[2]).unwrap(),
            "putm cpu.load 3000 30.0 dc=east host=s1"
        );
    }

    #[test]
    fn test_rejects_text_and_whitespace() {
        let mut builder = MetricBuilder::new();
        builder
            .add_metric("status")
            .unwrap()
            .add_tag("host", "s1")
            .unwrap()
            .add_data_point(1, "up")
            .unwrap();
        let metric = &builder.metrics()[0];
        assert!(matches!(
            format_line(metric, &metric.data_points()[0]),
            Err(Error::Validation(_))
        ));

        let mut builder = MetricBuilder::new();
        builder
            .add_metric("cpu")
            .unwrap()
            .add_tag("host", "my host")
            .unwrap()
            .add_data_point(1, 1)
            .unwrap();
        let metric = &builder.metrics()[0];
        assert!(format_line(metric, &metric.data_points()[0]).is_err());
    }
}
