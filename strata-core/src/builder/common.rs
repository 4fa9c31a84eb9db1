//! Composer traits shared across the query builders
//!
//! Each trait adds one family of clauses on top of [`QueryBuilder`] and
//! writes straight into the builder's segment store. A builder opts into
//! the families that make sense for its statement kind.

use crate::builder::{IntoColumns, JoinType, QueryBuilder, WhereConnector};
use crate::segment::{normalize_types, Group, FIELD_DIVIDER, JOIN_DIVIDER};
use crate::{IntoOperator, Operator, Result, Value};

fn collect_values<I, V>(values: I) -> Vec<Value>
where
    I: IntoIterator<Item = V>,
    V: Into<Value>,
{
    values.into_iter().map(Into::into).collect()
}

fn placeholders(count: usize) -> String {
    vec!["?"; count].join(", ")
}

/// WHERE-style conditions joined by the builder's connector
pub trait Conditional: QueryBuilder {
    /// Join subsequently added conditions with AND
    fn set_cond_and(mut self) -> Self
    where
        Self: Sized,
    {
        self.store_mut().set_connector(WhereConnector::And);
        self
    }

    /// Join subsequently added conditions with OR
    fn set_cond_or(mut self) -> Self
    where
        Self: Sized,
    {
        self.store_mut().set_connector(WhereConnector::Or);
        self
    }

    /// `field = ?`
    fn cond<V>(self, field: &str, tag: char, value: V) -> Self
    where
        Self: Sized,
        V: Into<Value>,
    {
        self.cond_op(field, Operator::EQ, tag, value)
    }

    /// `field <operator> ?`
    fn cond_op<O, V>(mut self, field: &str, operator: O, tag: char, value: V) -> Self
    where
        Self: Sized,
        O: IntoOperator,
        V: Into<Value>,
    {
        let sql = format!("{} {} ?", field, operator.into_operator());
        let divider = self.store().condition_divider();
        self.store_mut().push_bound(
            Group::Conditional,
            divider,
            sql,
            tag.to_string(),
            vec![value.into()],
        );
        self
    }

    /// `field IN (?, ...)`, every value bound with the same tag.
    ///
    /// An empty list can never match and compiles to `0 = 1`.
    fn cond_in<I, V>(mut self, field: &str, tag: char, values: I) -> Self
    where
        Self: Sized,
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        let values = collect_values(values);
        let sql = if values.is_empty() {
            "0 = 1".to_string()
        } else {
            format!("{} IN ({})", field, placeholders(values.len()))
        };
        let types = tag.to_string().repeat(values.len());
        let divider = self.store().condition_divider();
        self.store_mut()
            .push_bound(Group::Conditional, divider, sql, types, values);
        self
    }

    /// `field NOT IN (?, ...)`; an empty list always matches (`1 = 1`)
    fn cond_not_in<I, V>(mut self, field: &str, tag: char, values: I) -> Self
    where
        Self: Sized,
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        let values = collect_values(values);
        let sql = if values.is_empty() {
            "1 = 1".to_string()
        } else {
            format!("{} NOT IN ({})", field, placeholders(values.len()))
        };
        let types = tag.to_string().repeat(values.len());
        let divider = self.store().condition_divider();
        self.store_mut()
            .push_bound(Group::Conditional, divider, sql, types, values);
        self
    }

    /// `field <operator> <expr>` where `expr` carries its own placeholders
    fn cond_expr<O, I, V>(
        mut self,
        field: &str,
        expr: &str,
        operator: O,
        types: &str,
        values: I,
    ) -> Result<Self>
    where
        Self: Sized,
        O: IntoOperator,
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        let values = collect_values(values);
        let types = normalize_types(types, values.len())?;
        let sql = format!("{} {} {}", field, operator.into_operator(), expr);
        let divider = self.store().condition_divider();
        self.store_mut()
            .push_bound(Group::Conditional, divider, sql, types, values);
        Ok(self)
    }

    /// `field <operator> (<sub-query>)`
    fn cond_query<O, Q>(mut self, field: &str, operator: O, builder: Q) -> Self
    where
        Self: Sized,
        O: IntoOperator,
        Q: QueryBuilder + 'static,
    {
        let before = format!("{} {} (", field, operator.into_operator());
        let divider = self.store().condition_divider();
        self.store_mut().push_query(
            Group::Conditional,
            divider,
            before,
            ")".to_string(),
            Box::new(builder),
        );
        self
    }

    /// Parenthesized group of conditions, usually a [`ConditionQuery`]
    ///
    /// [`ConditionQuery`]: crate::ConditionQuery
    fn cond_group<Q>(mut self, builder: Q) -> Self
    where
        Self: Sized,
        Q: QueryBuilder + 'static,
    {
        let divider = self.store().condition_divider();
        self.store_mut().push_query(
            Group::Conditional,
            divider,
            "(".to_string(),
            ")".to_string(),
            Box::new(builder),
        );
        self
    }
}

fn join_condition(
    master: Option<&str>,
    alias: &str,
    field1: &str,
    field2: Option<&str>,
    operator: &Operator,
) -> String {
    match (field2, master) {
        (Some(field2), _) => format!("{} {} {}", field1, operator, field2),
        (None, Some(master)) => format!("{}.{} {} {}.{}", master, field1, operator, alias, field1),
        (None, None) => format!("{} {} {}.{}", field1, operator, alias, field1),
    }
}

/// JOIN clauses.
///
/// When `field2` is omitted the join matches a column of the same name on
/// both sides: `master.field1 = alias.field1`.
pub trait Join: QueryBuilder {
    fn join(self, table: &str, alias: &str, field1: &str, field2: Option<&str>) -> Self
    where
        Self: Sized,
    {
        self.join_with(JoinType::Inner, table, alias, field1, field2, Operator::EQ)
    }

    fn join_left(self, table: &str, alias: &str, field1: &str, field2: Option<&str>) -> Self
    where
        Self: Sized,
    {
        self.join_with(JoinType::Left, table, alias, field1, field2, Operator::EQ)
    }

    fn join_right(self, table: &str, alias: &str, field1: &str, field2: Option<&str>) -> Self
    where
        Self: Sized,
    {
        self.join_with(JoinType::Right, table, alias, field1, field2, Operator::EQ)
    }

    fn join_with<O>(
        mut self,
        join_type: JoinType,
        table: &str,
        alias: &str,
        field1: &str,
        field2: Option<&str>,
        operator: O,
    ) -> Self
    where
        Self: Sized,
        O: IntoOperator,
    {
        let on = join_condition(
            self.store().master_table(),
            alias,
            field1,
            field2,
            &operator.into_operator(),
        );
        let sql = format!("{} JOIN {} {} ON {}", join_type, table, alias, on);
        self.store_mut()
            .push_bound(Group::Join, JOIN_DIVIDER, sql, String::new(), Vec::new());
        self
    }

    fn join_query<Q>(self, builder: Q, alias: &str, field1: &str, field2: Option<&str>) -> Self
    where
        Self: Sized,
        Q: QueryBuilder + 'static,
    {
        self.join_query_with(JoinType::Inner, builder, alias, field1, field2, Operator::EQ)
    }

    fn join_left_query<Q>(self, builder: Q, alias: &str, field1: &str, field2: Option<&str>) -> Self
    where
        Self: Sized,
        Q: QueryBuilder + 'static,
    {
        self.join_query_with(JoinType::Left, builder, alias, field1, field2, Operator::EQ)
    }

    fn join_right_query<Q>(self, builder: Q, alias: &str, field1: &str, field2: Option<&str>) -> Self
    where
        Self: Sized,
        Q: QueryBuilder + 'static,
    {
        self.join_query_with(JoinType::Right, builder, alias, field1, field2, Operator::EQ)
    }

    /// Join against a derived table: `<type> JOIN (<sub-query>) alias ON ...`
    fn join_query_with<Q, O>(
        mut self,
        join_type: JoinType,
        builder: Q,
        alias: &str,
        field1: &str,
        field2: Option<&str>,
        operator: O,
    ) -> Self
    where
        Self: Sized,
        Q: QueryBuilder + 'static,
        O: IntoOperator,
    {
        let on = join_condition(
            self.store().master_table(),
            alias,
            field1,
            field2,
            &operator.into_operator(),
        );
        self.store_mut().push_query(
            Group::Join,
            JOIN_DIVIDER,
            format!("{} JOIN (", join_type),
            format!(") {} ON {}", alias, on),
            Box::new(builder),
        );
        self
    }
}

/// Projection list of a SELECT
pub trait SelectableFields: QueryBuilder {
    fn field(mut self, name: &str) -> Self
    where
        Self: Sized,
    {
        self.store_mut().push_bound(
            Group::Field,
            FIELD_DIVIDER,
            name.to_string(),
            String::new(),
            Vec::new(),
        );
        self
    }

    /// `name AS alias`
    fn field_as(mut self, name: &str, alias: &str) -> Self
    where
        Self: Sized,
    {
        self.store_mut().push_bound(
            Group::Field,
            FIELD_DIVIDER,
            format!("{} AS {}", name, alias),
            String::new(),
            Vec::new(),
        );
        self
    }

    /// One segment per column
    fn fields<C>(self, names: C) -> Self
    where
        Self: Sized,
        C: IntoColumns,
    {
        names
            .into_columns()
            .iter()
            .fold(self, |builder, name| builder.field(name))
    }

    /// Computed column with its own placeholders
    fn field_expr<I, V>(
        mut self,
        expr: &str,
        alias: Option<&str>,
        types: &str,
        values: I,
    ) -> Result<Self>
    where
        Self: Sized,
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        let values = collect_values(values);
        let types = normalize_types(types, values.len())?;
        let sql = match alias {
            Some(alias) => format!("{} AS {}", expr, alias),
            None => expr.to_string(),
        };
        self.store_mut()
            .push_bound(Group::Field, FIELD_DIVIDER, sql, types, values);
        Ok(self)
    }
}

/// Column assignments of INSERT and UPDATE
pub trait ChangeableFields: QueryBuilder {
    /// Text written in front of the value part of an assignment.
    ///
    /// UPDATE renders `column = `; INSERT remembers the column for its
    /// column list and writes nothing.
    fn assignment_prefix(&mut self, column: &str) -> String;

    /// `column = ?`
    fn field<V>(mut self, column: &str, tag: char, value: V) -> Self
    where
        Self: Sized,
        V: Into<Value>,
    {
        let sql = format!("{}?", self.assignment_prefix(column));
        self.store_mut().push_bound(
            Group::Field,
            FIELD_DIVIDER,
            sql,
            tag.to_string(),
            vec![value.into()],
        );
        self
    }

    /// `column = <expr>` where `expr` carries its own placeholders
    fn field_expr<I, V>(mut self, column: &str, expr: &str, types: &str, values: I) -> Result<Self>
    where
        Self: Sized,
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        let values = collect_values(values);
        let types = normalize_types(types, values.len())?;
        let sql = format!("{}{}", self.assignment_prefix(column), expr);
        self.store_mut()
            .push_bound(Group::Field, FIELD_DIVIDER, sql, types, values);
        Ok(self)
    }

    /// `column = (<sub-query>)`
    fn field_query<Q>(mut self, column: &str, builder: Q) -> Self
    where
        Self: Sized,
        Q: QueryBuilder + 'static,
    {
        let before = format!("{}(", self.assignment_prefix(column));
        self.store_mut().push_query(
            Group::Field,
            FIELD_DIVIDER,
            before,
            ")".to_string(),
            Box::new(builder),
        );
        self
    }
}

/// FROM list of a SELECT
pub trait TableExtended: QueryBuilder {
    fn table(mut self, name: &str) -> Self
    where
        Self: Sized,
    {
        self.store_mut().push_table(name, None);
        self
    }

    fn table_as(mut self, name: &str, alias: &str) -> Self
    where
        Self: Sized,
    {
        self.store_mut().push_table(name, Some(alias));
        self
    }

    /// Derived table: `(<sub-query>) alias`
    fn table_query<Q>(mut self, builder: Q, alias: Option<&str>) -> Self
    where
        Self: Sized,
        Q: QueryBuilder + 'static,
    {
        self.store_mut().push_table_query(Box::new(builder), alias);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_placeholders() {
        assert_eq!(placeholders(1), "?");
        assert_eq!(placeholders(3), "?, ?, ?");
    }

    #[test]
    fn test_join_condition_shorthand() {
        assert_eq!(
            join_condition(Some("u"), "r", "role_id", None, &Operator::EQ),
            "u.role_id = r.role_id"
        );
        assert_eq!(
            join_condition(None, "r", "role_id", None, &Operator::EQ),
            "role_id = r.role_id"
        );
        assert_eq!(
            join_condition(Some("u"), "r", "u.id", Some("r.user_id"), &Operator::GTE),
            "u.id >= r.user_id"
        );
    }
}
